//! Macros for decoding fixed-width wire fields out of `&mut &[u8]` buffers.
//! Each read consumes the bytes it parsed, so decoders thread one buffer
//! through a sequence of reads and fail up front via [`check_buf_len`].

/// Reads a big-endian integer of type `$ty` from the front of the buffer and
/// advances past it. The caller has already checked the buffer is long
/// enough.
#[macro_export]
macro_rules! from_be_bytes_slice_and_advance_buf {
    ($ty:ty, $buf: expr) => {{
        let width = ::std::mem::size_of::<$ty>();
        let head: [u8; ::std::mem::size_of::<$ty>()] =
            $buf[..width].try_into().expect("buffer length checked by caller");
        ::alloy_primitives::bytes::Buf::advance($buf, width);
        <$ty>::from_be_bytes(head)
    }};
}

/// Reads a fixed-byte value (`B256`, `Address`, ...) from the front of the
/// buffer and advances past it.
#[macro_export]
macro_rules! from_slice_and_advance_buf {
    ($ty: ty, $buf: expr) => {{
        let val = <$ty>::from_slice(&$buf[0..::std::mem::size_of::<$ty>()]);
        ::alloy_primitives::bytes::Buf::advance($buf, ::std::mem::size_of::<$ty>());
        val
    }};
}

/// Returns the provided error when the buffer holds fewer than `$len` bytes.
#[macro_export]
macro_rules! check_buf_len {
    ($buf: expr, $len: expr, $err: expr) => {{
        if $buf.len() < $len {
            return Err($err)
        }
    }};
}
