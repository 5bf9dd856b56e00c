// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::hid::{ButtonRange, QueryError, ValueRange};

/// Initial size of the byte and UTF-16 scratch buffers.
const INITIAL_CHUNK: usize = 512;

/// Reusable buffers for capability and report queries.
///
/// One instance exists per process, owned by the dispatcher on the worker
/// thread; arrivals and reports are processed one at a time, so no locking is
/// needed. Buffers grow to whatever size a query reports and never shrink,
/// keeping the per-report decode path allocation-free once warmed up.
#[derive(Debug)]
pub(crate) struct ScratchBuffers {
    /// Device interface path, UTF-16.
    pub device_path: Vec<u16>,
    /// Human-readable product string, UTF-16.
    pub product_name: Vec<u16>,
    /// Preparsed capability blob.
    pub preparsed: Vec<u8>,
    /// Button capability ranges parsed out of the blob.
    pub button_caps: Vec<ButtonRange>,
    /// Value capability ranges parsed out of the blob.
    pub value_caps: Vec<ValueRange>,
    /// Sparse pressed-usage list for one button page.
    pub usages: Vec<u16>,
    /// Raw report bytes copied out of the input message.
    pub report: Vec<u8>,
}

impl ScratchBuffers {
    pub fn new() -> Self {
        ScratchBuffers {
            device_path: vec![0; INITIAL_CHUNK],
            product_name: vec![0; INITIAL_CHUNK],
            preparsed: vec![0; INITIAL_CHUNK],
            button_caps: Vec::with_capacity(8),
            value_caps: Vec::with_capacity(8),
            usages: vec![0; INITIAL_CHUNK],
            report: vec![0; INITIAL_CHUNK],
        }
    }
}

/// Grows `buf` to hold at least `len` elements. Never shrinks.
pub(crate) fn ensure_len<T: Default + Clone>(buf: &mut Vec<T>, len: usize) {
    if buf.len() < len {
        buf.resize(len, T::default());
    }
}

/// Runs an OS query that follows the two-call size-then-fetch pattern.
///
/// `query` is called once with `None` and must return the required element
/// count; `buf` is grown to that count and `query` is called again with the
/// sized buffer, returning the number of elements written. The written count
/// is returned; the caller reads `buf[..written]`.
pub(crate) fn two_call_query<T, F>(buf: &mut Vec<T>, mut query: F) -> Result<usize, QueryError>
where
    T: Default + Clone,
    F: FnMut(Option<&mut [T]>) -> Result<usize, QueryError>,
{
    let required = query(None)?;
    ensure_len(buf, required);
    query(Some(&mut buf[..required]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_to_reported_size_and_never_shrinks() {
        let mut buf: Vec<u8> = vec![0; 4];

        let written = two_call_query(&mut buf, |chunk| match chunk {
            None => Ok(1024),
            Some(chunk) => {
                assert_eq!(chunk.len(), 1024);
                chunk[..3].copy_from_slice(b"abc");
                Ok(3)
            }
        })
        .unwrap();
        assert_eq!(written, 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(buf.len(), 1024);

        // A smaller follow-up query must not shrink the buffer.
        let written = two_call_query(&mut buf, |chunk| match chunk {
            None => Ok(16),
            Some(chunk) => Ok(chunk.len()),
        })
        .unwrap();
        assert_eq!(written, 16);
        assert_eq!(buf.len(), 1024);
    }

    #[test]
    fn size_query_failure_leaves_buffer_alone() {
        let mut buf: Vec<u16> = vec![7; 8];
        let err = two_call_query(&mut buf, |chunk| match chunk {
            None => Err(QueryError::new("SizeQuery", 5)),
            Some(_) => panic!("fetch must not run after a failed size query"),
        });
        assert!(err.is_err());
        assert_eq!(buf, vec![7; 8]);
    }
}
