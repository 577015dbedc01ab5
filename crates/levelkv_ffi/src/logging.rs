//! Diagnostic side channel to the host.
//!
//! Lines go to the sink registered with [`levelkv_set_log_sink`], or to
//! `tracing` when no sink is registered.

use crate::types::LevelKvLogSink;
use levelkv_core::Logger;
use parking_lot::RwLock;
use std::ffi::CString;

/// Component tag for engine info-log lines.
pub const ENGINE_COMPONENT: &str = "levelkv:engine";

/// Component tag for iterator status diagnostics.
pub const ITERATOR_COMPONENT: &str = "levelkv:iterator";

static SINK: RwLock<Option<LevelKvLogSink>> = parking_lot::const_rwlock(None);

/// Registers the process-wide log sink; null restores `tracing` output.
#[no_mangle]
pub extern "C" fn levelkv_set_log_sink(sink: Option<LevelKvLogSink>) {
    *SINK.write() = sink;
}

/// Sends one line to the host sink, or to `tracing`.
pub fn emit(component: &str, message: &str) {
    let sink = *SINK.read();
    match sink {
        Some(sink) => {
            let component = to_cstring(component);
            let message = to_cstring(message);
            sink(component.as_ptr(), message.as_ptr());
        }
        None if component == ITERATOR_COMPONENT => {
            tracing::warn!(target: "levelkv::iterator", "{message}");
        }
        None => tracing::info!(target: "levelkv::engine", "{message}"),
    }
}

fn to_cstring(text: &str) -> CString {
    let mut bytes = text.as_bytes().to_vec();
    bytes.retain(|&b| b != 0);
    CString::new(bytes).unwrap_or_default()
}

/// Engine info log that forwards to the host sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostLogger;

impl Logger for HostLogger {
    fn log(&self, message: &str) {
        emit(ENGINE_COMPONENT, message);
    }
}
