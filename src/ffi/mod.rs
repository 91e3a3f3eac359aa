//! C-linkage entry points for hosts running in another runtime.
//!
//! Every call takes the context returned by [`term_embed_context_new`].
//! Surfaces are passed as `u64` handles where `0` means null. All calls must
//! come from the thread that created the context.
mod context;

pub use context::EmbedContext;

use std::ffi::{CStr, c_char, c_int};
use std::path::Path;
use std::ptr;

use tracing::{debug, error};

use crate::service::RemoteTarget;
use crate::surface::SurfaceId;

/// Read an optional UTF-8 string; invalid sequences are replaced
unsafe fn opt_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: the caller passes a valid NUL-terminated string
    let value = unsafe { CStr::from_ptr(ptr) };
    Some(value.to_string_lossy().into_owned())
}

unsafe fn borrow_context<'a>(ctx: *const EmbedContext) -> Option<&'a EmbedContext> {
    // SAFETY: non-null pointers come from term_embed_context_new
    let context = unsafe { ctx.as_ref() };
    if context.is_none() {
        debug!("Ignoring call with a null context");
    }
    context
}

fn handle(surface: Option<SurfaceId>) -> u64 {
    surface.map_or(0, SurfaceId::as_u64)
}

/// Create a context. A null `config_path` uses the default lookup; returns
/// null if the configuration cannot be loaded.
///
/// # Safety
/// `config_path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn term_embed_context_new(config_path: *const c_char) -> *mut EmbedContext {
    let path = unsafe { opt_string(config_path) };
    match EmbedContext::from_config_path(path.as_deref().map(Path::new)) {
        Ok(context) => Box::into_raw(Box::new(context)),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            ptr::null_mut()
        }
    }
}

/// Destroy a context and every surface it holds.
///
/// # Safety
/// `ctx` must be null or a pointer from [`term_embed_context_new`] that has
/// not been freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn term_embed_context_free(ctx: *mut EmbedContext) {
    if !ctx.is_null() {
        // SAFETY: ownership returns from the host
        drop(unsafe { Box::from_raw(ctx) });
    }
}

/// Create an empty host surface to embed sessions into.
///
/// # Safety
/// `ctx` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn term_embed_surface_new(ctx: *const EmbedContext) -> u64 {
    match unsafe { borrow_context(ctx) } {
        Some(context) => context.create_surface().as_u64(),
        None => 0,
    }
}

/// Destroy a surface, its embedded sessions and their registrations.
///
/// # Safety
/// `ctx` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn term_embed_surface_destroy(ctx: *const EmbedContext, surface: u64) {
    if let (Some(context), Some(surface)) = (unsafe { borrow_context(ctx) }, SurfaceId::from_raw(surface)) {
        context.destroy_surface(surface);
    }
}

/// Create a terminal surface running ssh to `user@host` on `port`.
///
/// Returns `0` if the terminal part is unavailable.
///
/// # Safety
/// `ctx` must be null or a live context; string arguments must be null or
/// valid NUL-terminated strings.
#[unsafe(export_name = "createRemoteSessionWidget")]
pub unsafe extern "C" fn create_remote_session_widget(
    ctx: *const EmbedContext,
    user: *const c_char,
    host: *const c_char,
    port: c_int,
    key_path: *const c_char,
    initial_command: *const c_char,
    parent: u64,
) -> u64 {
    let Some(context) = (unsafe { borrow_context(ctx) }) else {
        return 0;
    };

    let mut target = RemoteTarget::new(
        unsafe { opt_string(user) }.unwrap_or_default(),
        unsafe { opt_string(host) }.unwrap_or_default(),
        context::port_from_c(port),
    );
    target.key_path = unsafe { opt_string(key_path) };
    target.initial_command = unsafe { opt_string(initial_command) };

    handle(context.create_remote_session(&target, SurfaceId::from_raw(parent)))
}

/// Create a terminal surface running a local shell.
///
/// Returns `0` if the terminal part is unavailable.
///
/// # Safety
/// `ctx` must be null or a live context; `shell_path` must be null or a valid
/// NUL-terminated string.
#[unsafe(export_name = "createLocalSessionWidget")]
pub unsafe extern "C" fn create_local_session_widget(
    ctx: *const EmbedContext,
    shell_path: *const c_char,
    parent: u64,
) -> u64 {
    let Some(context) = (unsafe { borrow_context(ctx) }) else {
        return 0;
    };
    let shell = unsafe { opt_string(shell_path) };
    handle(context.create_local_session(shell.as_deref(), SurfaceId::from_raw(parent)))
}

/// Write `text` and a newline into the session on `surface`, if it has one.
///
/// # Safety
/// `ctx` must be null or a live context; `text` must be null or a valid
/// NUL-terminated string.
#[unsafe(export_name = "sendInput")]
pub unsafe extern "C" fn send_input(ctx: *const EmbedContext, surface: u64, text: *const c_char) {
    if let Some(context) = unsafe { borrow_context(ctx) } {
        let text = unsafe { opt_string(text) };
        context.send_input(SurfaceId::from_raw(surface), text.as_deref());
    }
}

/// Copy pending session output into `buf`.
///
/// Returns the number of bytes written, or `-1` if `surface` has no session.
///
/// # Safety
/// `ctx` must be null or a live context; `buf` must be valid for `len` bytes
/// of writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn term_embed_read_output(
    ctx: *const EmbedContext,
    surface: u64,
    buf: *mut u8,
    len: usize,
) -> isize {
    let (Some(context), Some(surface)) = (unsafe { borrow_context(ctx) }, SurfaceId::from_raw(surface)) else {
        return -1;
    };
    if buf.is_null() {
        return -1;
    }

    match context.read_output(surface, len.min(isize::MAX as usize)) {
        Some(bytes) => {
            // SAFETY: bytes.len() <= len and the caller owns `len` bytes at `buf`
            unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len()) };
            bytes.len() as isize
        }
        None => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedConfig;
    use crate::part::{MemoryPartFactory, PartLoader};
    use std::ffi::CString;

    fn memory_context(factory: MemoryPartFactory) -> *mut EmbedContext {
        let mut loader = PartLoader::new();
        loader.register(factory);
        let mut config = EmbedConfig::default();
        config.terminal.part = "memory".to_string();
        Box::into_raw(Box::new(EmbedContext::with_loader(config, loader)))
    }

    #[test]
    fn remote_widget_round_trip() {
        let factory = MemoryPartFactory::default();
        let ctx = memory_context(factory.clone());
        let user = CString::new("alice").unwrap();
        let host = CString::new("example.com").unwrap();
        let key = CString::new("").unwrap();
        let cmd = CString::new("whoami").unwrap();
        let text = CString::new("ls -la").unwrap();

        unsafe {
            let parent = term_embed_surface_new(ctx);
            let surface = create_remote_session_widget(
                ctx,
                user.as_ptr(),
                host.as_ptr(),
                22,
                key.as_ptr(),
                cmd.as_ptr(),
                parent,
            );
            assert_ne!(surface, 0);

            send_input(ctx, surface, text.as_ptr());

            let terminal = &factory.terminals()[0];
            assert_eq!(terminal.args(), vec!["alice@example.com", "-p", "22"]);
            assert_eq!(terminal.input_text(), "whoami\nls -la\n");

            let mut buf = [0u8; 64];
            let n = term_embed_read_output(ctx, surface, buf.as_mut_ptr(), buf.len());
            assert_eq!(&buf[..n as usize], b"whoami\nls -la\n");

            term_embed_surface_destroy(ctx, parent);
            assert_eq!(term_embed_read_output(ctx, surface, buf.as_mut_ptr(), buf.len()), -1);
            // Input after teardown is silently dropped
            send_input(ctx, surface, text.as_ptr());

            term_embed_context_free(ctx);
        }
        assert!(factory.terminals().is_empty());
    }

    #[test]
    fn null_arguments_are_tolerated() {
        let factory = MemoryPartFactory::default();
        let ctx = memory_context(factory.clone());

        unsafe {
            assert_eq!(term_embed_surface_new(ptr::null()), 0);
            assert_eq!(create_local_session_widget(ptr::null(), ptr::null(), 0), 0);
            send_input(ptr::null(), 1, ptr::null());
            term_embed_surface_destroy(ptr::null(), 1);

            let surface = create_local_session_widget(ctx, ptr::null(), 0);
            assert_ne!(surface, 0);
            send_input(ctx, surface, ptr::null());
            send_input(ctx, 0, ptr::null());
            assert!(factory.terminals()[0].inputs().is_empty());

            let mut buf = [0u8; 4];
            assert_eq!(term_embed_read_output(ctx, surface, ptr::null_mut(), 4), -1);
            assert_eq!(term_embed_read_output(ctx, 0, buf.as_mut_ptr(), 4), -1);

            term_embed_context_free(ctx);
            term_embed_context_free(ptr::null_mut());
        }
    }

    #[test]
    fn missing_config_file_yields_null_context() {
        let path = CString::new("/nonexistent/term_embed/config.toml").unwrap();
        let ctx = unsafe { term_embed_context_new(path.as_ptr()) };
        assert!(ctx.is_null());
    }

    #[test]
    fn unavailable_part_yields_null_handle() {
        let mut config = EmbedConfig::default();
        config.terminal.part = "konsole".to_string();
        let ctx = Box::into_raw(Box::new(EmbedContext::with_loader(config, PartLoader::new())));
        let user = CString::new("alice").unwrap();
        let host = CString::new("example.com").unwrap();
        let cmd = CString::new("ls\n").unwrap();

        unsafe {
            let parent = term_embed_surface_new(ctx);
            let surface = create_remote_session_widget(
                ctx,
                user.as_ptr(),
                host.as_ptr(),
                22,
                ptr::null(),
                cmd.as_ptr(),
                parent,
            );
            assert_eq!(surface, 0);

            let parent_surface = (*ctx).surface(SurfaceId::from_raw(parent).unwrap()).unwrap();
            assert!(!parent_surface.has_layout());

            term_embed_context_free(ctx);
        }
    }
}
