//! C stdio streams behind checked pointers.
//!
//! A stream is a [`Ptr<FILE>`](Ptr): null-checked before every call, and
//! nulled by [`fclose`]. Buffers are checked array pointers whose span is
//! validated before libc sees them. Formatting goes through
//! [`std::fmt::Arguments`], so arguments are checked against the format at
//! compile time instead of being counted at run time.

use super::string::terminated_ptr;
use crate::error::{trap, Violation};
use crate::ptr::{BoundedPtr, Ptr};
use core::ffi::{c_int, c_long};
use core::str::FromStr;
use std::fmt;
use libc::FILE;
use std::io::{self, Write};
use zerocopy::{AsBytes, FromBytes};

pub use libc::{SEEK_CUR, SEEK_END, SEEK_SET};

/// Value returned by [`fgetc`] at end of file or on error.
pub const EOF: c_int = libc::EOF;

#[inline]
#[track_caller]
fn stream(file: &Ptr<FILE>) -> *mut FILE {
    if file.is_null() {
        trap(Violation::NullDereference);
    }
    file.as_raw()
}

/// Opens `filename` with the C `mode` string. Returns null on failure.
#[track_caller]
pub fn fopen<N: BoundedPtr<u8>, M: BoundedPtr<u8>>(filename: &N, mode: &M) -> Ptr<FILE> {
    let filename = terminated_ptr(filename);
    let mode = terminated_ptr(mode);
    // SAFETY: both strings are terminated; a non-null result is a live
    // stream owned by libc until `fclose`.
    unsafe { Ptr::from_raw(libc::fopen(filename, mode)) }
}

/// Closes the stream and nulls the handle.
#[track_caller]
pub fn fclose(file: &mut Ptr<FILE>) -> c_int {
    let raw = stream(file);
    *file = Ptr::null();
    // SAFETY: live stream, closed exactly once through this handle.
    unsafe { libc::fclose(raw) }
}

/// Reads one byte, or [`EOF`].
#[track_caller]
pub fn fgetc(file: &Ptr<FILE>) -> c_int {
    // SAFETY: live stream.
    unsafe { libc::fgetc(stream(file)) }
}

/// Reads up to `count` elements into `buf`. Returns the number read.
///
/// # Panics
/// Traps if `buf` does not have `count` elements from its current index.
#[track_caller]
pub fn fread<T: FromBytes, P: BoundedPtr<T>>(buf: &P, count: usize, file: &Ptr<FILE>) -> usize {
    let data = buf.require_span(count);
    // SAFETY: `count` elements validated; any bytes form a valid `T`.
    unsafe { libc::fread(data.cast(), core::mem::size_of::<T>(), count, stream(file)) }
}

/// Writes `count` elements from `buf`. Returns the number written.
#[track_caller]
pub fn fwrite<T: AsBytes, P: BoundedPtr<T>>(buf: &P, count: usize, file: &Ptr<FILE>) -> usize {
    let data = buf.require_span(count);
    // SAFETY: `count` elements validated; `AsBytes` types have no padding.
    unsafe {
        libc::fwrite(
            data.cast_const().cast(),
            core::mem::size_of::<T>(),
            count,
            stream(file),
        )
    }
}

/// Reads a line of at most `num - 1` bytes into `buf` and terminates it.
/// Returns `None` at end of file or on error.
#[track_caller]
pub fn fgets<P: BoundedPtr<u8>>(buf: &P, num: usize, file: &Ptr<FILE>) -> Option<P> {
    let data = buf.require_span(num);
    let num = c_int::try_from(num).unwrap_or(c_int::MAX);
    // SAFETY: `num` bytes validated.
    let read = unsafe { libc::fgets(data.cast(), num, stream(file)) };
    (!read.is_null()).then(|| buf.offset(0))
}

/// Writes the terminated string in `s`, without its terminator.
#[track_caller]
pub fn fputs<P: BoundedPtr<u8>>(s: &P, file: &Ptr<FILE>) -> c_int {
    let text = terminated_ptr(s);
    // SAFETY: terminated string and live stream.
    unsafe { libc::fputs(text, stream(file)) }
}

/// Moves the file position to `offset` relative to `origin`.
#[track_caller]
pub fn fseek(file: &Ptr<FILE>, offset: c_long, origin: c_int) -> c_int {
    // SAFETY: live stream.
    unsafe { libc::fseek(stream(file), offset, origin) }
}

/// Current file position, or -1 on error.
#[track_caller]
pub fn ftell(file: &Ptr<FILE>) -> c_long {
    // SAFETY: live stream.
    unsafe { libc::ftell(stream(file)) }
}

/// Returns `true` once a read has hit end of file.
#[track_caller]
pub fn feof(file: &Ptr<FILE>) -> bool {
    // SAFETY: live stream.
    unsafe { libc::feof(stream(file)) != 0 }
}

/// Returns `true` if the stream's error indicator is set.
#[track_caller]
pub fn ferror(file: &Ptr<FILE>) -> bool {
    // SAFETY: live stream.
    unsafe { libc::ferror(stream(file)) != 0 }
}

/// Flushes buffered output.
#[track_caller]
pub fn fflush(file: &Ptr<FILE>) -> c_int {
    // SAFETY: live stream.
    unsafe { libc::fflush(stream(file)) }
}

/// Skips leading whitespace, then passes each byte of the next word to
/// `push` until whitespace, end of file or `limit` bytes. The byte that ended
/// the word is pushed back onto the stream. Returns `None` if the stream
/// ended before a word started.
fn scan_word(raw: *mut FILE, limit: usize, mut push: impl FnMut(u8)) -> Option<usize> {
    // SAFETY: `raw` is a live stream for every call below.
    let mut c = unsafe { libc::fgetc(raw) };
    while c != EOF && unsafe { libc::isspace(c) } != 0 {
        c = unsafe { libc::fgetc(raw) };
    }
    if c == EOF {
        return None;
    }
    let mut len = 0;
    while c != EOF && unsafe { libc::isspace(c) } == 0 && len < limit {
        // `fgetc` yields bytes as non-negative ints.
        push(c as u8);
        len += 1;
        c = unsafe { libc::fgetc(raw) };
    }
    if c != EOF {
        unsafe { libc::ungetc(c, raw) };
    }
    Some(len)
}

/// Reads one whitespace-delimited word into `buf` and terminates it, like
/// `fscanf` with a `%s` whose width is the room left in `buf` minus one.
/// Returns the word length, or `None` at end of file.
///
/// # Panics
/// Traps if `buf` has no room from its current index.
#[track_caller]
pub fn fscan_word<P: BoundedPtr<u8>>(buf: &P, file: &Ptr<FILE>) -> Option<usize> {
    let room = buf.remaining();
    let data = buf.require_span(room.max(1));
    let raw = stream(file);
    let mut written = 0;
    let len = scan_word(raw, room - 1, |byte| {
        // SAFETY: at most `room - 1` bytes, inside the validated span.
        unsafe { data.add(written).write(byte) };
        written += 1;
    });
    // SAFETY: `written < room`.
    unsafe { data.add(written).write(0) };
    len
}

/// Reads the next whitespace-delimited word and parses it, the typed form of
/// a single `fscanf` conversion such as `%d` or `%f`. Returns `None` at end
/// of file or if the word does not parse; the word is consumed either way.
#[track_caller]
pub fn fscan<T: FromStr>(file: &Ptr<FILE>) -> Option<T> {
    let raw = stream(file);
    let mut word = Vec::new();
    scan_word(raw, usize::MAX, |byte| word.push(byte))?;
    core::str::from_utf8(&word).ok()?.parse().ok()
}

/// Formats `args` to the stream. Returns the number of bytes written.
#[track_caller]
pub fn fprintf(file: &Ptr<FILE>, args: fmt::Arguments<'_>) -> io::Result<usize> {
    let raw = stream(file);
    let text = fmt::format(args);
    // SAFETY: `text` is a live buffer of `len` bytes.
    let written = unsafe { libc::fwrite(text.as_ptr().cast(), 1, text.len(), raw) };
    if written < text.len() {
        return Err(io::Error::last_os_error());
    }
    Ok(written)
}

/// Formats `args` to standard output. Returns the number of bytes written.
pub fn printf(args: fmt::Arguments<'_>) -> io::Result<usize> {
    let text = fmt::format(args);
    io::stdout().lock().write_all(text.as_bytes())?;
    Ok(text.len())
}

/// Formats `args` into `buf`, writing at most `size - 1` bytes plus a
/// terminator. Returns the length of the full formatted text, which exceeds
/// `size - 1` when the output was truncated.
///
/// # Panics
/// Traps if `buf` does not have `size` bytes from its current index.
#[track_caller]
pub fn snprintf<P: BoundedPtr<u8>>(buf: &P, size: usize, args: fmt::Arguments<'_>) -> usize {
    let data = buf.require_span(size);
    let text = fmt::format(args);
    if size > 0 {
        let kept = text.len().min(size - 1);
        // SAFETY: `size` bytes validated and `kept < size`.
        unsafe {
            core::ptr::copy_nonoverlapping(text.as_ptr(), data, kept);
            data.add(kept).write(0);
        }
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::new_array;
    use crate::ffi::string::{literal, strcmp};
    use core::cmp::Ordering;

    fn scratch_path(tag: &str) -> crate::ptr::ArrayPtr<u8> {
        let path = std::env::temp_dir().join(format!("rampart-{}-{tag}.txt", std::process::id()));
        literal(&path.to_string_lossy())
    }

    #[test]
    fn test_write_then_read_back() {
        let path = scratch_path("roundtrip");
        let mut out = fopen(&path, &literal("w"));
        assert!(!out.is_null());
        assert!(fputs(&literal("hello\n"), &out) >= 0);
        assert_eq!(fprintf(&out, format_args!("{}-{}\n", 1, 2)).unwrap(), 4);
        assert_eq!(fclose(&mut out), 0);
        assert!(out.is_null());

        let mut input = fopen(&path, &literal("r"));
        let line = new_array::<u8>(16);
        let got = fgets(&line, 16, &input).unwrap();
        assert_eq!(strcmp(&got, &literal("hello\n")), Ordering::Equal);
        assert_eq!(fgetc(&input), c_int::from(b'1'));
        assert_eq!(fseek(&input, 0, SEEK_END), 0);
        assert_eq!(ftell(&input), 10);
        assert_eq!(fgetc(&input), EOF);
        assert!(feof(&input));
        assert!(!ferror(&input));
        fclose(&mut input);
        let _ = std::fs::remove_file(std::env::temp_dir().join(format!(
            "rampart-{}-roundtrip.txt",
            std::process::id()
        )));
    }

    #[test]
    fn test_scan_words_and_numbers() {
        let path = scratch_path("scan");
        let mut out = fopen(&path, &literal("w"));
        fprintf(&out, format_args!("  alpha 42\n-7 2.5 overlong\tx")).unwrap();
        fclose(&mut out);

        let mut input = fopen(&path, &literal("r"));
        let word = new_array::<u8>(6);
        assert_eq!(fscan_word(&word, &input), Some(5));
        assert_eq!(strcmp(&word, &literal("alpha")), Ordering::Equal);
        assert_eq!(fscan::<u32>(&input), Some(42));
        assert_eq!(fscan::<i64>(&input), Some(-7));
        assert_eq!(fscan::<f64>(&input), Some(2.5));
        // Width-limited: the rest of the word stays in the stream.
        assert_eq!(fscan_word(&word, &input), Some(5));
        assert_eq!(strcmp(&word, &literal("overl")), Ordering::Equal);
        assert_eq!(fscan_word(&word, &input), Some(3));
        assert_eq!(strcmp(&word, &literal("ong")), Ordering::Equal);
        assert_eq!(fscan::<u8>(&input), None);
        assert_eq!(fscan_word(&word, &input), None);
        fclose(&mut input);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_fscan_word_needs_room() {
        let buf = new_array::<u8>(4);
        let input = Ptr::null();
        fscan_word(&buf.offset(4), &input);
    }

    #[test]
    fn test_binary_records() {
        let path = scratch_path("binary");
        let values = crate::alloc::new_array_with(3, |i| i as u32 * 7);
        let mut out = fopen(&path, &literal("wb"));
        assert_eq!(fwrite(&values, 3, &out), 3);
        fflush(&out);
        fclose(&mut out);

        let back = new_array::<u32>(3);
        let mut input = fopen(&path, &literal("rb"));
        assert_eq!(fread(&back, 3, &input), 3);
        assert_eq!(back.as_slice(), &[0, 7, 14]);
        fclose(&mut input);
    }

    #[test]
    #[should_panic(expected = "span out of bounds")]
    fn test_fread_checks_span() {
        let buf = new_array::<u8>(4);
        let input = Ptr::null();
        fread(&buf, 5, &input);
    }

    #[test]
    #[should_panic(expected = "null dereference")]
    fn test_null_stream_traps() {
        let mut stream = Ptr::null();
        fclose(&mut stream);
    }

    #[test]
    fn test_snprintf_truncates() {
        let buf = new_array::<u8>(6);
        let full = snprintf(&buf, 6, format_args!("value={}", 42));
        assert_eq!(full, 8);
        assert_eq!(strcmp(&buf, &literal("value")), Ordering::Equal);
    }

    #[test]
    fn test_missing_file_is_null() {
        let path = literal("/nonexistent-rampart-dir/none.txt");
        assert!(fopen(&path, &literal("r")).is_null());
    }
}
