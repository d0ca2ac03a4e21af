//! Sample native plugin.
//!
//! Build with `cargo build --release -p plugin_hello`, then copy this crate's
//! `package.json` and the built library into `<project>/plugins/hello/` with
//! `main` pointing at the library.

use extension_host::{declare_native_plugin, ffi_guard, native_method, ExportsDescriptor};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

static INSTALLS: AtomicUsize = AtomicUsize::new(0);

fn descriptor() -> ExportsDescriptor {
    ExportsDescriptor::new().with_named(
        "HelloPlugin",
        json!({
            "name": "hello",
            "version": env!("CARGO_PKG_VERSION"),
            "displayName": "Hello",
            "category": "samples",
            "install": native_method("hello_install"),
            "uninstall": native_method("hello_uninstall"),
        }),
    )
}

declare_native_plugin!(descriptor());

#[no_mangle]
pub extern "C" fn hello_install() -> i32 {
    ffi_guard(|| {
        let count = INSTALLS.fetch_add(1, Ordering::SeqCst) + 1;
        info!("👋 HelloPlugin: installed (install #{})", count);
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn hello_uninstall() -> i32 {
    ffi_guard(|| {
        // only ever balanced against a prior install
        INSTALLS
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| info!("👋 HelloPlugin: uninstalled"))
            .map_err(|_| "uninstall without a matching install".to_string())
    })
}
