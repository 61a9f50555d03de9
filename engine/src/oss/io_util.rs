use nix::libc;

/// Read up to `len` bytes from a non-blocking fd. WouldBlock counts as a
/// zero-byte transfer, not an error.
pub(super) fn read_nonblock(fd: i32, dst: &mut [u8], len: usize) -> std::io::Result<usize> {
    if len == 0 {
        return Ok(0);
    }
    let n = unsafe { libc::read(fd, dst.as_mut_ptr() as *mut libc::c_void, len.min(dst.len())) };
    if n >= 0 {
        return Ok(n as usize);
    }
    let e = std::io::Error::last_os_error();
    if e.kind() == std::io::ErrorKind::WouldBlock {
        return Ok(0);
    }
    Err(e)
}

/// Write up to `len` bytes to a non-blocking fd.
pub(super) fn write_nonblock(fd: i32, src: &[u8], len: usize) -> std::io::Result<usize> {
    if len == 0 {
        return Ok(0);
    }
    let n = unsafe { libc::write(fd, src.as_ptr() as *const libc::c_void, len.min(src.len())) };
    if n >= 0 {
        return Ok(n as usize);
    }
    let e = std::io::Error::last_os_error();
    if e.kind() == std::io::ErrorKind::WouldBlock {
        return Ok(0);
    }
    Err(e)
}

/// Copy out of a mapped device ring, wrapping at `total` bytes.
pub(super) fn map_read(
    map: *mut libc::c_void,
    total: usize,
    dst: &mut [u8],
    mut offset: usize,
    mut length: usize,
) -> usize {
    if map.is_null() || length == 0 || total == 0 {
        return 0;
    }
    offset %= total;
    length = length.min(total).min(dst.len());
    let mut copied = 0;
    while length > 0 {
        let take = (total - offset).min(length);
        unsafe {
            std::ptr::copy_nonoverlapping(
                (map as *const u8).add(offset),
                dst[copied..].as_mut_ptr(),
                take,
            );
        }
        copied += take;
        length -= take;
        offset = 0;
    }
    copied
}

/// Copy into a mapped device ring, wrapping at `total` bytes.
pub(super) fn map_write(
    map: *mut libc::c_void,
    total: usize,
    src: &[u8],
    mut offset: usize,
    mut length: usize,
) -> usize {
    if map.is_null() || length == 0 || total == 0 {
        return 0;
    }
    offset %= total;
    length = length.min(total).min(src.len());
    let mut copied = 0;
    while length > 0 {
        let take = (total - offset).min(length);
        unsafe {
            std::ptr::copy_nonoverlapping(src[copied..].as_ptr(), (map as *mut u8).add(offset), take);
        }
        copied += take;
        length -= take;
        offset = 0;
    }
    copied
}
