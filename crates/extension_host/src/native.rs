//! Shared-library entry points
//!
//! A native plugin is a `cdylib` exporting two C symbols:
//!
//! - `ext_host_abi_version() -> *const c_char`, the ABI version it was built against
//! - `ext_host_exports() -> *const c_char`, a JSON [`ExportsDescriptor`]
//!
//! Callable properties in the descriptor are written as `{"$fn": "symbol"}`
//! and bound to `extern "C" fn() -> i32` symbols of the same library, where
//! a non-zero return is an error. Use [`crate::declare_native_plugin!`] and
//! [`ffi_guard`] on the plugin side.

use crate::entry::{EntryLoader, ModuleSpecifier};
use crate::error::{HostError, HostResult};
use crate::plugin::{ExportObject, ExportValue, LoadedEntry, PluginMethod, Property};
use crate::utils::{c_str_to_string, is_version_compatible};
use async_trait::async_trait;
use libloading::{Library, Symbol};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const METHOD_KEY: &str = "$fn";

/// Safety checks applied to shared-library plugins
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeLoaderConfig {
    /// Load plugins built against an incompatible ABI version
    pub allow_abi_mismatch: bool,

    /// Require the exact ABI version instead of a major.minor match
    pub strict_versioning: bool,
}

/// JSON document returned by `ext_host_exports`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportsDescriptor {
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub named: Vec<(String, Value)>,
}

impl ExportsDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.push((name.into(), value));
        self
    }

    /// Parse the document a library returned from `ext_host_exports`
    pub fn from_json(json: &str) -> HostResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Turn the descriptor into exports, binding method markers through `resolve`
    pub fn into_entry<F>(self, resolve: F) -> HostResult<LoadedEntry>
    where
        F: Fn(&str) -> HostResult<PluginMethod>,
    {
        let default = self.default.map(|value| bind_value(value, &resolve)).transpose()?;
        let named = self
            .named
            .into_iter()
            .map(|(name, value)| Ok((name, bind_value(value, &resolve)?)))
            .collect::<HostResult<Vec<_>>>()?;
        Ok(LoadedEntry { default, named })
    }
}

/// Marker for a callable property backed by `symbol`
pub fn native_method(symbol: &str) -> Value {
    json!({ METHOD_KEY: symbol })
}

fn method_symbol(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(METHOD_KEY).and_then(Value::as_str),
        _ => None,
    }
}

fn bind_value<F>(value: Value, resolve: &F) -> HostResult<ExportValue>
where
    F: Fn(&str) -> HostResult<PluginMethod>,
{
    let Value::Object(map) = value else {
        return Ok(ExportValue::Value(value));
    };

    let mut object = ExportObject::new();
    for (key, property) in map {
        match method_symbol(&property) {
            Some(symbol) => object.set(key, Property::Method(resolve(symbol)?)),
            None => object.set(key, Property::Value(property)),
        }
    }
    Ok(ExportValue::Object(object))
}

/// Run a plugin-side method body at the FFI boundary: 0 on success, 1 on error, 2 on panic
pub fn ffi_guard<F>(body: F) -> i32
where
    F: FnOnce() -> Result<(), String>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(body)) {
        Ok(Ok(())) => 0,
        Ok(Err(message)) => {
            warn!("Native plugin method failed: {}", message);
            1
        }
        Err(_) => 2,
    }
}

/// Loads entry points that are shared libraries
pub struct NativeEntryLoader {
    config: NativeLoaderConfig,
}

impl NativeEntryLoader {
    pub fn new(config: NativeLoaderConfig) -> Self {
        Self { config }
    }

    /// Shared-library extension for the current platform
    pub fn library_extension() -> &'static str {
        #[cfg(target_os = "windows")]
        let ext = "dll";

        #[cfg(target_os = "macos")]
        let ext = "dylib";

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let ext = "so";

        ext
    }

    /// Validate the ABI version a plugin was built against
    pub fn check_abi(&self, plugin_version: &str) -> HostResult<()> {
        if self.config.allow_abi_mismatch {
            return Ok(());
        }

        let expected = crate::ABI_VERSION;

        if self.config.strict_versioning {
            if plugin_version != expected {
                return Err(HostError::VersionMismatch(format!(
                    "Exact ABI version mismatch: plugin v{}, host v{}",
                    plugin_version, expected
                )));
            }
        } else if !is_version_compatible(plugin_version, expected) {
            return Err(HostError::VersionMismatch(format!(
                "ABI version mismatch: plugin v{}, host v{}",
                plugin_version, expected
            )));
        }

        Ok(())
    }

    fn load_library(&self, path: &Path) -> HostResult<LoadedEntry> {
        let library = unsafe {
            Library::new(path).map_err(|e| HostError::LibraryError(format!("Failed to load library: {}", e)))?
        };
        let library = Arc::new(library);

        let version = unsafe {
            let abi_version: Symbol<unsafe extern "C" fn() -> *const c_char> =
                library.get(b"ext_host_abi_version").map_err(|e| {
                    HostError::LoadingFailed(format!("Plugin does not export 'ext_host_abi_version': {}", e))
                })?;
            c_str_to_string(abi_version())
        }
        .ok_or_else(|| HostError::LoadingFailed("Plugin returned a null ABI version".to_string()))?;

        self.check_abi(&version)?;

        let exports = unsafe {
            let exports: Symbol<unsafe extern "C" fn() -> *const c_char> =
                library.get(b"ext_host_exports").map_err(|e| {
                    HostError::LoadingFailed(format!("Plugin does not export 'ext_host_exports': {}", e))
                })?;
            c_str_to_string(exports())
        }
        .ok_or_else(|| HostError::LoadingFailed("Plugin returned null exports".to_string()))?;

        let descriptor = ExportsDescriptor::from_json(&exports)?;

        debug!("Library {} built against ABI v{}", path.display(), version);
        descriptor.into_entry(|symbol| bind_symbol(&library, symbol))
    }
}

impl Default for NativeEntryLoader {
    fn default() -> Self {
        Self::new(NativeLoaderConfig::default())
    }
}

/// Bind a method symbol; the returned method keeps the library loaded
fn bind_symbol(library: &Arc<Library>, symbol: &str) -> HostResult<PluginMethod> {
    let function: unsafe extern "C" fn() -> i32 = unsafe {
        *library
            .get::<unsafe extern "C" fn() -> i32>(symbol.as_bytes())
            .map_err(|e| HostError::LoadingFailed(format!("Missing method symbol '{}': {}", symbol, e)))?
    };

    let library = library.clone();
    let symbol = symbol.to_string();
    Ok(PluginMethod::new(move || {
        let library = library.clone();
        let symbol = symbol.clone();
        async move {
            // plugin code may block, keep it off the async workers
            let code = tokio::task::spawn_blocking(move || {
                let _library = &library;
                unsafe { function() }
            })
            .await
            .map_err(|e| HostError::PluginFailed(format!("native method '{}' did not complete: {}", symbol, e)))?;

            match code {
                0 => Ok(()),
                code => Err(HostError::PluginFailed(format!(
                    "native method '{}' returned {}",
                    symbol, code
                ))),
            }
        }
    }))
}

#[async_trait]
impl EntryLoader for NativeEntryLoader {
    async fn load(&self, specifier: &ModuleSpecifier) -> HostResult<LoadedEntry> {
        let path: PathBuf = specifier.path.clone();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(HostError::EntryPointMissing(path));
        }

        info!("Loading native plugin library: {}", specifier);
        let loader = NativeEntryLoader::new(self.config.clone());
        tokio::task::spawn_blocking(move || loader.load_library(&path))
            .await
            .map_err(|e| HostError::LoadingFailed(format!("Library load task failed: {}", e)))?
    }
}

/// Generate the C exports of a native plugin from an [`ExportsDescriptor`] expression.
///
/// The descriptor is evaluated once, on first request.
#[macro_export]
macro_rules! declare_native_plugin {
    ($descriptor:expr) => {
        #[no_mangle]
        pub extern "C" fn ext_host_abi_version() -> *const ::std::os::raw::c_char {
            static VERSION: ::std::sync::OnceLock<::std::ffi::CString> = ::std::sync::OnceLock::new();
            VERSION
                .get_or_init(|| ::std::ffi::CString::new($crate::ABI_VERSION).unwrap_or_default())
                .as_ptr()
        }

        #[no_mangle]
        pub extern "C" fn ext_host_exports() -> *const ::std::os::raw::c_char {
            static EXPORTS: ::std::sync::OnceLock<Option<::std::ffi::CString>> = ::std::sync::OnceLock::new();
            // a panicking descriptor must not unwind into the host
            let exports = EXPORTS.get_or_init(|| {
                ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                    let descriptor: $crate::native::ExportsDescriptor = $descriptor;
                    ::std::ffi::CString::new(descriptor.to_json()).ok()
                }))
                .ok()
                .flatten()
            });
            match exports {
                Some(exports) => exports.as_ptr(),
                None => ::std::ptr::null(),
            }
        }
    };
}
