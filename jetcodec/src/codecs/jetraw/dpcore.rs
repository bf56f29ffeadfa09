// SPDX-License-Identifier: LGPL-2.1

//! Bindings to the external jetraw/dpcore plugin.
//!
//! The plugin is located, staged to a temporary path and loaded into the
//! process exactly once, shared by every codec instance. All entry points are
//! serialized behind a single lock: dpcore keeps process-global calibration
//! state and is not documented to be reentrant.

use std::env;
use std::ffi::CString;
use std::fs;
use std::io::Write;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lazy_static::lazy_static;
use libloading::Library;
use log::debug;
use tempfile::{NamedTempFile, TempPath};

use crate::codecs::{CodecError, Result};

/// Env var pointing directly at a plugin file, takes precedence over the
/// bundled locations.
pub const PLUGIN_PATH_ENV: &str = "JETRAW_PLUGIN";

/// Env var naming an additional directory searched for the plugin.
pub const PLUGIN_DIR_ENV: &str = "JETRAW_PLUGIN_DIR";

const DPCORE_OK: i32 = 0;

/// Host platforms with a distributed plugin build.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Platform {
  Windows,
  MacOs,
  Linux,
}

impl Platform {
  /// Platform of the compile-time target.
  pub fn current() -> Result<Self> {
    if cfg!(target_os = "windows") {
      Ok(Self::Windows)
    } else if cfg!(target_os = "macos") {
      Ok(Self::MacOs)
    } else if cfg!(unix) {
      Ok(Self::Linux)
    } else {
      Err(CodecError::UnsupportedPlatform(env::consts::OS.to_string()))
    }
  }

  /// File name of the plugin as shipped for this platform.
  pub fn plugin_filename(&self) -> &'static str {
    match self {
      Self::Windows => "jetraw_plugin.dll",
      Self::MacOs => "libjetraw_plugin.dylib",
      Self::Linux => "libjetraw_plugin.so",
    }
  }
}

/// The four operations of the external transform.
///
/// [`DpcoreLibrary`] is the production implementation. Tests substitute an
/// in-memory transform to exercise the codec layer without the plugin.
pub trait DpcoreTransform: Send + Sync {
  /// One-time initialization of the plugin core.
  fn init(&self) -> Result<()>;

  /// Calibrates `samples` in place for the camera named by `identifier`.
  fn prepare(&self, samples: &mut [u16], identifier: &str, error_bound: f32) -> Result<()>;

  /// Encodes `samples` into `out`, returning the encoded length in bytes.
  fn encode(&self, samples: &[u16], width: usize, height: usize, out: &mut [u8]) -> Result<usize>;

  /// Decodes `data`, filling `out` completely. The compressed buffer must
  /// encode exactly `out.len()` samples, this is the plugin's own contract
  /// and not re-validated here.
  fn decode(&self, data: &[u8], out: &mut [u16]) -> Result<()>;
}

type InitFn = unsafe extern "C" fn() -> i32;
type PrepareFn = unsafe extern "C" fn(*mut u16, i64, *const c_char, f32) -> i32;
type EncodeFn = unsafe extern "C" fn(*const u16, i32, i32, *mut u8, i32) -> i32;
type DecodeFn = unsafe extern "C" fn(*const u8, i32, *mut u16, i32);

fn resolve<T: Copy>(lib: &Library, name: &[u8]) -> Result<T> {
  let symbol = unsafe { lib.get::<T>(name) }
    .map_err(|e| CodecError::MissingResource(format!("symbol {}: {}", String::from_utf8_lossy(name), e)))?;
  Ok(*symbol)
}

fn locate_plugin(filename: &str) -> Result<PathBuf> {
  if let Ok(path) = env::var(PLUGIN_PATH_ENV) {
    let path = PathBuf::from(path);
    if path.is_file() {
      return Ok(path);
    }
    return Err(CodecError::MissingResource(format!(
      "{} points to missing file: {}",
      PLUGIN_PATH_ENV,
      path.display()
    )));
  }
  let mut candidates = Vec::new();
  if let Ok(dir) = env::var(PLUGIN_DIR_ENV) {
    candidates.push(PathBuf::from(dir));
  }
  if let Ok(exe) = env::current_exe() {
    if let Some(dir) = exe.parent() {
      candidates.push(dir.to_owned());
    }
  }
  for dir in &candidates {
    let path = dir.join(filename);
    if path.is_file() {
      return Ok(path);
    }
  }
  Err(CodecError::MissingResource(format!("plugin {} not found in {:?}", filename, candidates)))
}

// Loading straight from the asset directory would pin it for the process
// lifetime (Windows locks loaded files in place), so a private copy is staged
// and loaded instead. The staged file lives until process exit.
fn stage_plugin(source: &Path) -> Result<TempPath> {
  let bytes = fs::read(source).map_err(|e| CodecError::MissingResource(format!("reading {}: {}", source.display(), e)))?;
  let mut staged =
    NamedTempFile::new().map_err(|e| CodecError::MissingResource(format!("staging plugin: {}", e)))?;
  staged
    .write_all(&bytes)
    .map_err(|e| CodecError::MissingResource(format!("staging plugin: {}", e)))?;
  Ok(staged.into_temp_path())
}

/// Safe wrapper around the loaded plugin.
///
/// Entry points are resolved once at load time. The `Library` and the staged
/// file are kept alive as long as the wrapper, which in practice is the rest
/// of the process.
pub struct DpcoreLibrary {
  init: InitFn,
  prepare: PrepareFn,
  encode: EncodeFn,
  decode: DecodeFn,
  _lib: Library,
  _staged: TempPath,
}

impl DpcoreLibrary {
  /// Locates, stages, loads and initializes the plugin for the current
  /// platform.
  pub fn load() -> Result<Self> {
    let platform = Platform::current()?;
    let source = locate_plugin(platform.plugin_filename())?;
    debug!("loading jetraw plugin from {}", source.display());
    let staged = stage_plugin(&source)?;
    let lib = unsafe { Library::new(&*staged) }
      .map_err(|e| CodecError::MissingResource(format!("loading {}: {}", source.display(), e)))?;

    let this = Self {
      init: resolve::<InitFn>(&lib, b"dpcore_init")?,
      prepare: resolve::<PrepareFn>(&lib, b"dpcore_prepare")?,
      encode: resolve::<EncodeFn>(&lib, b"jetraw_encode")?,
      decode: resolve::<DecodeFn>(&lib, b"jetraw_decode")?,
      _lib: lib,
      _staged: staged,
    };
    this.init()?;
    debug!("jetraw plugin loaded and initialized");
    Ok(this)
  }
}

impl DpcoreTransform for DpcoreLibrary {
  fn init(&self) -> Result<()> {
    let status = unsafe { (self.init)() };
    if status != DPCORE_OK {
      return Err(CodecError::MissingResource(format!("dpcore_init returned status {}", status)));
    }
    Ok(())
  }

  fn prepare(&self, samples: &mut [u16], identifier: &str, error_bound: f32) -> Result<()> {
    let identifier = CString::new(identifier).map_err(|_| CodecError::MissingIdentifier)?;
    let status = unsafe { (self.prepare)(samples.as_mut_ptr(), samples.len() as i64, identifier.as_ptr(), error_bound) };
    debug!("jetraw preparation exited with status: {}", status);
    if status != DPCORE_OK {
      return Err(CodecError::EncodingFailed(status));
    }
    Ok(())
  }

  fn encode(&self, samples: &[u16], width: usize, height: usize, out: &mut [u8]) -> Result<usize> {
    if samples.len() != width * height {
      return Err(CodecError::InvalidBufferLength(2 * samples.len()));
    }
    let status = unsafe { (self.encode)(samples.as_ptr(), width as i32, height as i32, out.as_mut_ptr(), out.len() as i32) };
    if status < 0 {
      return Err(CodecError::EncodingFailed(status));
    }
    Ok(status as usize)
  }

  fn decode(&self, data: &[u8], out: &mut [u16]) -> Result<()> {
    unsafe { (self.decode)(data.as_ptr(), data.len() as i32, out.as_mut_ptr(), out.len() as i32) };
    Ok(())
  }
}

enum ResourceState<T> {
  Unloaded,
  Ready(T),
  Failed(String),
}

/// Synchronized once-per-process loader cell.
///
/// The first caller runs the loader while holding the lock; callers racing it
/// block and then observe the terminal state. A failed load is terminal and
/// surfaces as [`CodecError::MissingResource`] on every later call. The lock
/// stays held while `f` runs, serializing entry into the resource.
pub(crate) struct ResourceCell<T> {
  state: Mutex<ResourceState<T>>,
}

impl<T> ResourceCell<T> {
  pub(crate) fn new() -> Self {
    Self {
      state: Mutex::new(ResourceState::Unloaded),
    }
  }

  pub(crate) fn with<R>(&self, load: impl FnOnce() -> Result<T>, f: impl FnOnce(&T) -> Result<R>) -> Result<R> {
    let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if matches!(*state, ResourceState::Unloaded) {
      match load() {
        Ok(resource) => *state = ResourceState::Ready(resource),
        Err(err) => {
          *state = ResourceState::Failed(err.to_string());
          return Err(err);
        }
      }
    }
    match &*state {
      ResourceState::Ready(resource) => f(resource),
      ResourceState::Failed(reason) => Err(CodecError::MissingResource(reason.clone())),
      ResourceState::Unloaded => unreachable!(),
    }
  }
}

lazy_static! {
  static ref DPCORE: ResourceCell<DpcoreLibrary> = ResourceCell::new();
}

/// Runs `f` against the process-wide plugin, loading it on first use.
pub(crate) fn with_dpcore<R>(f: impl FnOnce(&DpcoreLibrary) -> Result<R>) -> Result<R> {
  DPCORE.with(DpcoreLibrary::load, f)
}

#[cfg(test)]
mod tests {
  use std::sync::Barrier;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[test]
  fn plugin_filenames() {
    crate::init_test_logger();
    assert_eq!(Platform::Windows.plugin_filename(), "jetraw_plugin.dll");
    assert_eq!(Platform::MacOs.plugin_filename(), "libjetraw_plugin.dylib");
    assert_eq!(Platform::Linux.plugin_filename(), "libjetraw_plugin.so");
  }

  #[test]
  fn cell_loads_once_under_contention() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let threads = 8;
    let cell = ResourceCell::<u32>::new();
    let loads = AtomicUsize::new(0);
    let barrier = Barrier::new(threads);

    std::thread::scope(|scope| {
      for _ in 0..threads {
        scope.spawn(|| {
          barrier.wait();
          let value = cell
            .with(
              || {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(42)
              },
              |v| Ok(*v),
            )
            .unwrap();
          assert_eq!(value, 42);
        });
      }
    });

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    Ok(())
  }

  #[test]
  fn cell_failure_is_terminal() {
    crate::init_test_logger();
    let cell = ResourceCell::<u32>::new();
    let loads = AtomicUsize::new(0);
    let load = || {
      loads.fetch_add(1, Ordering::SeqCst);
      Err(CodecError::MissingResource("plugin not found".to_string()))
    };

    let first = cell.with(load, |v| Ok(*v)).unwrap_err();
    assert!(matches!(first, CodecError::MissingResource(_)));

    // later calls fail fast without another load attempt
    let second = cell.with(|| Ok(42), |v| Ok(*v)).unwrap_err();
    assert!(matches!(second, CodecError::MissingResource(_)));
    assert_eq!(loads.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn cell_reuses_loaded_resource() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let cell = ResourceCell::<u32>::new();
    let loads = AtomicUsize::new(0);
    for _ in 0..3 {
      let value = cell.with(
        || {
          loads.fetch_add(1, Ordering::SeqCst);
          Ok(7)
        },
        |v| Ok(*v),
      )?;
      assert_eq!(value, 7);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    Ok(())
  }
}
