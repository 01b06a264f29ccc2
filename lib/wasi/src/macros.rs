//! Macros to simplify some common WASI-specific tasks.

/// Like the `try!` macro or `?` syntax: returns the value if the computation
/// succeeded or returns the error value.
macro_rules! wasi_try {
    ($expr:expr) => {{
        let res: Result<_, $crate::types::Errno> = $expr;
        match res {
            Ok(val) => val,
            Err(err) => {
                tracing::trace!("wasi::wasi_try::err: {}", err);
                return err;
            }
        }
    }};
    ($expr:expr, $e:expr) => {{
        let opt: Option<_> = $expr;
        wasi_try!(opt.ok_or($e))
    }};
}

/// Like `wasi_try!` for guest-memory accesses: a fault becomes `EFAULT`.
macro_rules! wasi_try_mem {
    ($expr:expr) => {
        wasi_try!($expr.map_err($crate::memory::mem_error_to_wasi))
    };
}

/// Reads a string from Wasm memory, returning `EFAULT` if the pointer is out
/// of range and `EINVAL` if the bytes are not UTF-8.
macro_rules! get_input_str {
    ($memory:expr, $data:expr, $len:expr) => {{
        let bytes = wasi_try_mem!($memory.read($data, $len)).to_vec();
        wasi_try!(String::from_utf8(bytes).map_err(|_| $crate::types::Errno::Inval))
    }};
}
