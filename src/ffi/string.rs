//! NUL-terminated byte strings over array pointers.

use crate::alloc::new_array_with;
use crate::error::{trap, Violation};
use crate::ptr::{ArrayPtr, BoundedPtr};
use core::cmp::Ordering;
use core::ffi::c_char;
use core::ptr;
use core::slice;
use std::ffi::OsStr;

/// Bytes from the current index to the end of the extent.
#[track_caller]
fn window<P: BoundedPtr<u8>>(s: &P) -> &[u8] {
    let len = s.remaining();
    let data = s.require_span(len);
    // SAFETY: `len` bytes validated.
    unsafe { slice::from_raw_parts(data, len) }
}

/// Mutable form of [`window`].
#[track_caller]
fn window_mut<P: BoundedPtr<u8>>(s: &P) -> &mut [u8] {
    let len = s.remaining();
    let data = s.require_span(len);
    // SAFETY: `len` bytes validated.
    unsafe { slice::from_raw_parts_mut(data, len) }
}

/// The string contents, terminator excluded.
///
/// # Panics
/// Traps with [`Violation::Unterminated`] if there is no NUL in the extent.
#[track_caller]
fn contents<P: BoundedPtr<u8>>(s: &P) -> &[u8] {
    let bytes = window(s);
    match bytes.iter().position(|&b| b == 0) {
        Some(len) => &bytes[..len],
        None => trap(Violation::Unterminated {
            extent: bytes.len(),
        }),
    }
}

/// At most `n` leading bytes, stopping after a terminator.
#[track_caller]
fn prefix<P: BoundedPtr<u8>>(s: &P, n: usize) -> &[u8] {
    let bytes = window(s);
    let limit = n.min(bytes.len());
    match bytes[..limit].iter().position(|&b| b == 0) {
        Some(nul) => &bytes[..=nul],
        None if limit == n => &bytes[..n],
        None => trap(Violation::SpanOutOfBounds {
            index: s.index(),
            count: n,
            extent: s.size(),
        }),
    }
}

#[track_caller]
fn require_room(dst_index: isize, needed: usize, available: usize, extent: usize) {
    if needed > available {
        trap(Violation::SpanOutOfBounds {
            index: dst_index,
            count: needed,
            extent,
        });
    }
}

/// Returns `true` if `a_len` bytes at `a` and `b_len` bytes at `b` share an
/// address. An empty range inside the other one counts as shared.
fn overlapping(a: *const u8, a_len: usize, b: *const u8, b_len: usize) -> bool {
    let (a, b) = (a as usize, b as usize);
    a < b + b_len && b < a + a_len
}

/// A heap copy of `text` with a NUL terminator appended.
pub fn literal(text: &str) -> ArrayPtr<u8> {
    terminated_copy(text.as_bytes())
}

fn terminated_copy(bytes: &[u8]) -> ArrayPtr<u8> {
    new_array_with(bytes.len() + 1, |i| bytes.get(i).copied().unwrap_or(0))
}

/// The process arguments as terminated heap strings, program name first.
pub fn args() -> ArrayPtr<ArrayPtr<u8>> {
    argv_from(std::env::args_os())
}

/// Builds an argument vector of terminated heap strings from `args`.
pub fn argv_from<I>(args: I) -> ArrayPtr<ArrayPtr<u8>>
where
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let args: Vec<I::Item> = args.into_iter().collect();
    new_array_with(args.len(), |i| terminated_copy(args[i].as_ref().as_encoded_bytes()))
}

/// Length of the string, terminator excluded.
///
/// # Panics
/// Traps if the string is unterminated.
#[track_caller]
pub fn strlen<P: BoundedPtr<u8>>(s: &P) -> usize {
    contents(s).len()
}

/// Byte-wise comparison of two terminated strings.
#[track_caller]
pub fn strcmp<A: BoundedPtr<u8>, B: BoundedPtr<u8>>(a: &A, b: &B) -> Ordering {
    contents(a).cmp(contents(b))
}

/// Compares at most `n` bytes, stopping at the first terminator.
///
/// # Panics
/// Traps if either string has neither a terminator nor `n` bytes left.
#[track_caller]
pub fn strncmp<A: BoundedPtr<u8>, B: BoundedPtr<u8>>(a: &A, b: &B, n: usize) -> Ordering {
    let a = prefix(a, n);
    let b = prefix(b, n);
    let a = a.strip_suffix(&[0]).unwrap_or(a);
    let b = b.strip_suffix(&[0]).unwrap_or(b);
    a.cmp(b)
}

/// Appends `src` to the string in `dst`.
///
/// # Panics
/// Traps if either string is unterminated, if `dst` has no room for the
/// result and its terminator, or if the two overlap.
#[track_caller]
pub fn strcat<D: BoundedPtr<u8>, S: BoundedPtr<u8>>(dst: &D, src: &S) {
    strncat(dst, src, usize::MAX);
}

/// Appends at most `n` bytes of `src` to the string in `dst`, then a terminator.
#[track_caller]
pub fn strncat<D: BoundedPtr<u8>, S: BoundedPtr<u8>>(dst: &D, src: &S, n: usize) {
    let len = strlen(src).min(n);
    let start = strlen(dst);
    let room = dst.remaining();
    require_room(dst.index(), start + len + 1, room, dst.size());
    let out = dst.require_span(room);
    let from = src.require_span(len);
    if overlapping(out, start + len + 1, from, len) {
        trap(Violation::OverlappingCopy);
    }
    // SAFETY: both spans validated and disjoint; `start + len < room`.
    unsafe {
        ptr::copy_nonoverlapping(from, out.add(start), len);
        out.add(start + len).write(0);
    }
}

/// Copies the string in `src`, terminator included, to `dst`.
#[track_caller]
pub fn strcpy<D: BoundedPtr<u8>, S: BoundedPtr<u8>>(dst: &D, src: &S) {
    let len = strlen(src);
    let room = dst.remaining();
    require_room(dst.index(), len + 1, room, dst.size());
    let out = dst.require_span(room);
    let from = src.require_span(len);
    if overlapping(out, len + 1, from, len) {
        trap(Violation::OverlappingCopy);
    }
    // SAFETY: both spans validated and disjoint; `len < room`.
    unsafe {
        ptr::copy_nonoverlapping(from, out, len);
        out.add(len).write(0);
    }
}

/// Copies exactly `n` bytes into `dst`: the string in `src` up to its
/// terminator, then NUL padding. No terminator is added when `src` has `n`
/// or more bytes.
#[track_caller]
pub fn strncpy<D: BoundedPtr<u8>, S: BoundedPtr<u8>>(dst: &D, src: &S, n: usize) {
    let len = {
        let bytes = prefix(src, n);
        bytes.strip_suffix(&[0]).unwrap_or(bytes).len()
    };
    let room = dst.remaining();
    require_room(dst.index(), n, room, dst.size());
    let out = dst.require_span(n);
    let from = src.require_span(len);
    if overlapping(out, n, from, len) {
        trap(Violation::OverlappingCopy);
    }
    // SAFETY: both spans validated and disjoint; `len <= n`.
    unsafe {
        ptr::copy_nonoverlapping(from, out, len);
        ptr::write_bytes(out.add(len), 0, n - len);
    }
}

/// A pointer to the first occurrence of `c` in the string, or `None`.
/// Searching for `0` finds the terminator.
#[track_caller]
pub fn strchr<P: BoundedPtr<u8>>(s: &P, c: u8) -> Option<P> {
    let text = contents(s);
    let at = if c == 0 {
        Some(text.len())
    } else {
        text.iter().position(|&b| b == c)
    };
    at.map(|i| s.offset(i as isize))
}

/// Splits a string in place at delimiter bytes, like `strtok` with its
/// state held here instead of in a hidden static.
///
/// Each token is returned as a pointer into the original buffer; the
/// delimiter that ended it is overwritten with NUL.
#[derive(Debug)]
pub struct Tokenizer<P> {
    cursor: Option<P>,
}

impl<P: BoundedPtr<u8>> Tokenizer<P> {
    /// Starts tokenizing `text`.
    ///
    /// # Panics
    /// Traps if `text` is unterminated.
    #[track_caller]
    pub fn new(text: P) -> Self {
        let _ = contents(&text);
        Self { cursor: Some(text) }
    }

    /// The next token, skipping leading delimiters. `delims` may differ
    /// between calls.
    #[track_caller]
    pub fn next_token<D: BoundedPtr<u8>>(&mut self, delims: &D) -> Option<P> {
        let delims = contents(delims);
        let cursor = self.cursor.take()?;
        let text = window_mut(&cursor);
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        let start = text[..end].iter().position(|b| !delims.contains(b))?;
        let stop = text[start..end]
            .iter()
            .position(|b| delims.contains(b))
            .map_or(end, |i| start + i);
        if stop < end {
            text[stop] = 0;
            self.cursor = Some(cursor.offset(stop as isize + 1));
        }
        Some(cursor.offset(start as isize))
    }
}

/// Parses a leading decimal integer like C `atoi`.
#[track_caller]
pub fn atoi<P: BoundedPtr<u8>>(s: &P) -> i32 {
    let text = terminated_ptr(s);
    // SAFETY: `text` is NUL-terminated within its extent.
    unsafe { libc::atoi(text) }
}

/// Parses a leading decimal integer like C `atol`.
#[track_caller]
pub fn atol<P: BoundedPtr<u8>>(s: &P) -> i64 {
    let text = terminated_ptr(s);
    // SAFETY: `text` is NUL-terminated within its extent.
    i64::from(unsafe { libc::atol(text) })
}

/// Parses a leading floating-point number like C `atof`.
#[track_caller]
pub fn atof<P: BoundedPtr<u8>>(s: &P) -> f64 {
    let text = terminated_ptr(s);
    // SAFETY: `text` is NUL-terminated within its extent.
    unsafe { libc::atof(text) }
}

/// Raw pointer to a string whose termination has been validated.
#[track_caller]
pub(crate) fn terminated_ptr<P: BoundedPtr<u8>>(s: &P) -> *const c_char {
    contents(s).as_ptr().cast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::new_array;
    use crate::ptr::StackArrayPtr;

    #[test]
    fn test_literal_is_terminated() {
        let s = literal("Test");
        assert_eq!(s.size(), 5);
        assert_eq!(strlen(&s), 4);
        assert_eq!(s[4], 0);
    }

    #[test]
    #[should_panic(expected = "unterminated string")]
    fn test_unterminated_strlen_traps() {
        let s = new_array_with(3, |_| b'x');
        strlen(&s);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(strcmp(&literal("abc"), &literal("abc")), Ordering::Equal);
        assert_eq!(strcmp(&literal("abc"), &literal("abd")), Ordering::Less);
        assert_eq!(strcmp(&literal("abc"), &literal("ab")), Ordering::Greater);
        assert_eq!(strncmp(&literal("abcx"), &literal("abcy"), 3), Ordering::Equal);
        assert_eq!(strncmp(&literal("ab"), &literal("abc"), 8), Ordering::Less);
    }

    #[test]
    fn test_copy_and_concatenate() {
        let buf = new_array::<u8>(10);
        strcpy(&buf, &literal("Test"));
        strcat(&buf, &literal("Case"));
        assert_eq!(strcmp(&buf, &literal("TestCase")), Ordering::Equal);
        strncat(&buf, &literal("!?"), 1);
        assert_eq!(strlen(&buf), 9);
    }

    #[test]
    #[should_panic(expected = "span out of bounds")]
    fn test_strcat_overflow_traps() {
        let buf = new_array::<u8>(6);
        strcpy(&buf, &literal("Test"));
        strcat(&buf, &literal("XY"));
    }

    #[test]
    fn test_strncpy_pads() {
        let buf = new_array_with(6, |_| 0xAAu8);
        strncpy(&buf, &literal("ab"), 5);
        assert_eq!(buf.as_slice(), &[b'a', b'b', 0, 0, 0, 0xAA]);
    }

    #[test]
    fn test_strchr_offset() {
        let s = literal("Test");
        let e = strchr(&s, b'e').unwrap();
        assert_eq!(e - s, 1);
        assert_eq!(*e, b'e');
        assert!(strchr(&s, b'z').is_none());
        assert_eq!(strchr(&s, 0).unwrap().index(), 4);
    }

    #[test]
    fn test_tokenizer_splits_in_place() {
        let mut text = *b"Test,Test2,,Test3\0";
        let mut tokens = Tokenizer::new(StackArrayPtr::from_slice(&mut text));
        let comma = literal(",");
        let first = tokens.next_token(&comma).unwrap();
        let second = tokens.next_token(&comma).unwrap();
        let third = tokens.next_token(&comma).unwrap();
        assert_eq!(strcmp(&first, &literal("Test")), Ordering::Equal);
        assert_eq!(strcmp(&second, &literal("Test2")), Ordering::Equal);
        assert_eq!(strcmp(&third, &literal("Test3")), Ordering::Equal);
        assert!(tokens.next_token(&comma).is_none());
    }

    #[test]
    fn test_argv_wraps_each_argument() {
        let argv = argv_from(["prog", "-n", "3"]);
        assert_eq!(argv.size(), 3);
        assert_eq!(strcmp(&argv[0], &literal("prog")), Ordering::Equal);
        assert_eq!(atoi(&argv[2]), 3);
        assert!(argv[1].get(3).is_none());

        let own = args();
        assert!(own.size() >= 1);
        assert!(strlen(&own[0]) > 0);
    }

    #[test]
    #[should_panic(expected = "overlapping copy")]
    fn test_strcpy_overlap_traps() {
        let buf = new_array::<u8>(12);
        strcpy(&buf, &literal("abcdef"));
        strcpy(&buf.offset(2), &buf);
    }

    #[test]
    #[should_panic(expected = "overlapping copy")]
    fn test_strcat_onto_itself_traps() {
        let buf = new_array::<u8>(16);
        strcpy(&buf, &literal("abc"));
        strcat(&buf, &buf);
    }

    #[test]
    #[should_panic(expected = "overlapping copy")]
    fn test_strncpy_overlap_traps() {
        let buf = new_array::<u8>(8);
        strcpy(&buf.offset(2), &literal("xyz"));
        strncpy(&buf, &buf.offset(2), 4);
    }

    #[test]
    fn test_copy_between_neighbours_in_one_block() {
        let buf = new_array::<u8>(12);
        strcpy(&buf.offset(6), &literal("hey"));
        strcpy(&buf, &buf.offset(6));
        assert_eq!(strcmp(&buf, &literal("hey")), Ordering::Equal);
    }

    #[test]
    fn test_numeric_parsing() {
        assert_eq!(atoi(&literal("  42abc")), 42);
        assert_eq!(atol(&literal("-123456 rest")), -123_456);
        assert!((atof(&literal("2.5e1")) - 25.0).abs() < f64::EPSILON);
    }
}
