//! Post-match capture engine (spec §4.7): walks the flat capture list the VM
//! produced and materializes it into a `Vec<CapturedValue>`.
//!
//! Grounded on `spec.md` §4.7's "stack cursor `cap`" description; implemented
//! here as a recursive descent over capture entries rather than an explicit
//! cursor/stack, since Rust's call stack already gives us the nesting for
//! free (the teacher's `compiler/bytecode.rs` favors the same
//! recursion-over-explicit-stack style for its own tree walks).

use hashbrown::HashMap;

use crate::env::{CapturedValue, EnvValue, Environment};
use crate::error::{PegError, PegResult};
use crate::opcode::CapKind;

/// One record in the flat capture list the VM builds during a match.
#[derive(Clone, Debug)]
pub enum CaptureEntry {
    /// A self-contained open+close pair of known extent (`FullCapture`).
    Full {
        kind: CapKind,
        idx: crate::env::EnvIdx,
        pos: usize,
        len: usize,
    },
    /// Starts a subtree; matched by the next same-depth [`CaptureEntry::Close`].
    Open {
        kind: CapKind,
        idx: crate::env::EnvIdx,
        pos: usize,
    },
    /// Closes the innermost open subtree.
    Close { pos: usize },
    /// A value already fully computed at match time (used for `Runtime`
    /// capture extras, which are host values rather than byte spans).
    Value(CapturedValue),
}

type GroupMap = HashMap<String, Vec<CapturedValue>>;

/// Materialize the whole capture list into the caller-visible value list.
pub fn collect(
    entries: &[CaptureEntry],
    input: &[u8],
    env: &Environment,
    extras: &[CapturedValue],
) -> PegResult<Vec<CapturedValue>> {
    let mut groups = GroupMap::new();
    let children = collect_children(entries, 0, entries.len(), input, env, extras, &mut groups)?;
    Ok(children.into_iter().flat_map(|(_, _, v)| v).collect())
}

/// Materialize just the inner tuple for a pending `Runtime` capture, i.e.
/// every entry between its `Open` and the current end of the list.
pub fn collect_runtime_inner(
    entries: &[CaptureEntry],
    input: &[u8],
    env: &Environment,
    extras: &[CapturedValue],
) -> PegResult<Vec<CapturedValue>> {
    collect(entries, input, env, extras)
}

/// One immediate child's byte range and materialized values.
type Child = (usize, usize, Vec<CapturedValue>);

fn collect_children(
    entries: &[CaptureEntry],
    lo: usize,
    hi: usize,
    input: &[u8],
    env: &Environment,
    extras: &[CapturedValue],
    groups: &mut GroupMap,
) -> PegResult<Vec<Child>> {
    let mut out = Vec::new();
    let mut i = lo;
    while i < hi {
        match &entries[i] {
            CaptureEntry::Full { kind, idx, pos, len } => {
                let vals =
                    materialize_leaf(*kind, *idx, *pos, *len, input, env, extras, groups)?;
                out.push((*pos, pos + len, vals));
                i += 1;
            }
            CaptureEntry::Value(v) => {
                out.push((0, 0, vec![v.clone()]));
                i += 1;
            }
            CaptureEntry::Open { kind, idx, pos } => {
                let mut depth = 1usize;
                let mut j = i + 1;
                while depth > 0 {
                    match &entries[j] {
                        CaptureEntry::Open { .. } => depth += 1,
                        CaptureEntry::Close { .. } => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 {
                        break;
                    }
                    j += 1;
                }
                let close_pos = match &entries[j] {
                    CaptureEntry::Close { pos } => *pos,
                    _ => unreachable!("open without matching close"),
                };
                let children = collect_children(entries, i + 1, j, input, env, extras, groups)?;
                let inner_values: Vec<CapturedValue> =
                    children.iter().flat_map(|(_, _, v)| v.clone()).collect();
                let whole = input[*pos..close_pos].to_vec();
                let vals = materialize_group(
                    *kind, *idx, whole, inner_values, &children, *pos, close_pos, env, extras,
                    groups,
                )?;
                out.push((*pos, close_pos, vals));
                i = j + 1;
            }
            CaptureEntry::Close { .. } => unreachable!("close without matching open"),
        }
    }
    Ok(out)
}

/// `FullCapture` bundles an open+close pair whose body is a pure check
/// sequence (`static_len` in `capture.rs`), so it can never hold a nested
/// capture. Every kind that needs subtree handling (`Group`/`Table`/
/// `Function`/`Query`/`Fold`/`String`/`Subst`) is therefore equivalent to
/// the same kind materialized over an empty inner-value list, and is routed
/// through [`materialize_group`] rather than duplicating that logic here.
#[allow(clippy::too_many_arguments)]
fn materialize_leaf(
    kind: CapKind,
    idx: crate::env::EnvIdx,
    pos: usize,
    len: usize,
    input: &[u8],
    env: &Environment,
    extras: &[CapturedValue],
    groups: &mut GroupMap,
) -> PegResult<Vec<CapturedValue>> {
    let text = || input[pos..pos + len].to_vec();
    match kind {
        CapKind::Simple => Ok(vec![CapturedValue::Bytes(text())]),
        CapKind::Position => Ok(vec![CapturedValue::Position(pos)]),
        CapKind::Constant => match env.get(idx) {
            Some(EnvValue::Const(c)) => Ok(vec![CapturedValue::Const(c.clone())]),
            _ => Ok(vec![]),
        },
        CapKind::Argument => match env.get(idx) {
            Some(EnvValue::ArgIndex(n)) => {
                let n = *n as usize;
                extras
                    .get(n - 1)
                    .cloned()
                    .map(|v| vec![v])
                    .ok_or(PegError::ArgOutOfRange(n as i64))
            }
            _ => Ok(vec![]),
        },
        CapKind::Backref => {
            let name = crate::env::label_str(env, idx)?;
            groups
                .get(name)
                .cloned()
                .ok_or_else(|| PegError::BackrefNotFound(name.to_string()))
        }
        _ => materialize_group(
            kind,
            idx,
            text(),
            Vec::new(),
            &[],
            pos,
            pos + len,
            env,
            extras,
            groups,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn materialize_group(
    kind: CapKind,
    idx: crate::env::EnvIdx,
    whole: Vec<u8>,
    inner: Vec<CapturedValue>,
    children: &[Child],
    pos: usize,
    close_pos: usize,
    env: &Environment,
    _extras: &[CapturedValue],
    groups: &mut GroupMap,
) -> PegResult<Vec<CapturedValue>> {
    let _ = (pos, close_pos);
    match kind {
        CapKind::Simple => {
            if inner.is_empty() {
                Ok(vec![CapturedValue::Bytes(whole)])
            } else {
                let mut v = vec![CapturedValue::Bytes(whole)];
                v.extend(inner);
                Ok(v)
            }
        }
        CapKind::Group => {
            // A group with no inner captures yields its own matched text as
            // the single value (LPeg's `pushallvalues`), not an empty list.
            let values = if inner.is_empty() {
                vec![CapturedValue::Bytes(whole)]
            } else {
                inner
            };
            match env.get(idx) {
                Some(EnvValue::Label(name)) => {
                    groups.insert(name.clone(), values);
                    Ok(vec![])
                }
                _ => Ok(values),
            }
        }
        CapKind::Table => Ok(vec![CapturedValue::Group(inner)]),
        CapKind::Function => match env.get(idx) {
            Some(EnvValue::Function(f)) => Ok(vec![f(&inner)?]),
            _ => Ok(inner),
        },
        CapKind::Query => match env.get(idx) {
            Some(EnvValue::Mapping(m)) => Ok(match inner.first().and_then(|v| m(v)) {
                Some(v) => vec![v],
                None => vec![],
            }),
            _ => Ok(vec![]),
        },
        CapKind::Fold => match env.get(idx) {
            Some(EnvValue::Fold(f)) => {
                let mut it = inner.into_iter();
                let seed = it.next().ok_or(PegError::MissingFoldSeed)?;
                let mut acc = seed;
                for v in it {
                    acc = f(acc, &v)?;
                }
                Ok(vec![acc])
            }
            _ => Err(PegError::MissingFoldSeed),
        },
        CapKind::String => match env.get(idx) {
            Some(EnvValue::Format(fmt)) => {
                let whole_text = CapturedValue::Bytes(whole).as_text();
                Ok(vec![CapturedValue::Bytes(render_format(
                    fmt,
                    &whole_text,
                    &inner,
                )?)])
            }
            _ => Ok(vec![]),
        },
        CapKind::Subst => {
            let mut result = Vec::with_capacity(whole.len());
            let mut cursor = pos;
            for (child_start, child_end, child_vals) in children {
                result.extend_from_slice(&whole[cursor - pos..child_start - pos]);
                if let Some(v) = child_vals.first() {
                    result.extend_from_slice(&v.as_text());
                } else {
                    result.extend_from_slice(&whole[child_start - pos..child_end - pos]);
                }
                cursor = *child_end;
            }
            result.extend_from_slice(&whole[cursor - pos..]);
            Ok(vec![CapturedValue::Bytes(result)])
        }
        _ => Ok(inner),
    }
}

/// `%d` substitution for `String` captures: `%0` is the whole match, `%1..%9`
/// are sequential inner string fragments, `%%` is a literal percent.
fn render_format(fmt: &[u8], whole: &[u8], inner: &[CapturedValue]) -> PegResult<Vec<u8>> {
    let mut out = Vec::with_capacity(fmt.len());
    let mut it = fmt.iter().enumerate().peekable();
    while let Some((_, &b)) = it.next() {
        if b != b'%' {
            out.push(b);
            continue;
        }
        match it.next() {
            Some((_, b'%')) => out.push(b'%'),
            Some((_, d)) if d.is_ascii_digit() => {
                let digit = (d - b'0') as usize;
                if digit == 0 {
                    out.extend_from_slice(whole);
                } else {
                    let frag = inner
                        .get(digit - 1)
                        .ok_or(PegError::InvalidCaptureIndex(digit))?;
                    out.extend_from_slice(&frag.as_text());
                }
            }
            Some((_, other)) => return Err(PegError::InvalidCaptureIndex(*other as usize)),
            None => return Err(PegError::InvalidCaptureIndex(0)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_capture_with_no_inner_yields_whole_text() {
        let entries = vec![CaptureEntry::Full {
            kind: CapKind::Simple,
            idx: None,
            pos: 1,
            len: 3,
        }];
        let vals = collect(&entries, b"xabcx", &Environment::new(), &[]).unwrap();
        assert_eq!(vals.len(), 1);
        matches!(&vals[0], CapturedValue::Bytes(b) if b == b"abc");
    }

    #[test]
    fn nested_simple_prepends_whole_match() {
        let entries = vec![
            CaptureEntry::Open {
                kind: CapKind::Simple,
                idx: None,
                pos: 0,
            },
            CaptureEntry::Full {
                kind: CapKind::Simple,
                idx: None,
                pos: 2,
                len: 2,
            },
            CaptureEntry::Close { pos: 4 },
        ];
        let vals = collect(&entries, b"abcd", &Environment::new(), &[]).unwrap();
        assert_eq!(vals.len(), 2);
    }

    #[test]
    fn backref_missing_group_errors() {
        let mut env = Environment::new();
        let idx = env.push(EnvValue::Label("g".into()));
        let entries = vec![CaptureEntry::Full {
            kind: CapKind::Backref,
            idx,
            pos: 0,
            len: 0,
        }];
        let err = collect(&entries, b"", &env, &[]).unwrap_err();
        assert_eq!(err, PegError::BackrefNotFound("g".into()));
    }
}
