/// Shared helpers for unit tests (log capture, object fixtures)

use std::sync::{Arc, Mutex};
use crate::engine::Engine;
use crate::log::{Logger, LogEntry, LogSeverity};
use crate::config::Config;
use crate::device::{
    BindFlags, Buffer, BufferDesc, BufferView, BufferViewDesc, BufferViewType, RenderDevice,
    Sampler, SamplerDesc, Texture, TextureDesc, TextureView, TextureViewDesc, TextureViewType,
};

/// Logger that stores every entry for later inspection
pub struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

/// Handle to the entries captured since [`capture_logs`] was called
#[derive(Clone)]
pub struct CapturedLogs {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CapturedLogs {
    /// Number of entries with `severity` whose message contains `needle`
    pub fn count(&self, severity: LogSeverity, needle: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.severity == severity && e.message.contains(needle))
            .count()
    }

    pub fn contains(&self, severity: LogSeverity, needle: &str) -> bool {
        self.count(severity, needle) > 0
    }
}

impl Drop for CapturedLogs {
    fn drop(&mut self) {
        // Last handle restores the console logger
        if Arc::strong_count(&self.entries) == 2 {
            Engine::reset_logger();
        }
    }
}

/// Install a capturing logger; tests using this must be `#[serial]`
pub fn capture_logs() -> CapturedLogs {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });
    CapturedLogs { entries }
}

// ===== OBJECT FIXTURES =====

/// Device plus shorthand constructors for bindable objects
pub struct Fixture {
    pub device: RenderDevice,
}

impl Fixture {
    pub fn new() -> Self {
        Self { device: RenderDevice::new(Config::release().with_app_name("unit tests")) }
    }

    pub fn with_config(config: Config) -> Self {
        Self { device: RenderDevice::new(config) }
    }

    pub fn constant_buffer(&self, name: &str) -> Arc<Buffer> {
        self.device.create_buffer(BufferDesc::new(name, 256, BindFlags::UNIFORM_BUFFER)).unwrap()
    }

    /// Buffer usable in every buffer role
    pub fn rw_buffer(&self, name: &str) -> Arc<Buffer> {
        let flags = BindFlags::UNIFORM_BUFFER
            | BindFlags::SHADER_RESOURCE
            | BindFlags::UNORDERED_ACCESS
            | BindFlags::VERTEX_BUFFER
            | BindFlags::INDEX_BUFFER;
        self.device.create_buffer(BufferDesc::new(name, 1024, flags)).unwrap()
    }

    /// Texture usable in every texture role
    pub fn rw_texture(&self, name: &str) -> Arc<Texture> {
        let flags = BindFlags::SHADER_RESOURCE
            | BindFlags::UNORDERED_ACCESS
            | BindFlags::RENDER_TARGET;
        self.device.create_texture(TextureDesc::new_2d(name, 16, 16, flags)).unwrap()
    }

    pub fn sampler(&self, name: &str) -> Arc<Sampler> {
        self.device.create_sampler(SamplerDesc::new(name)).unwrap()
    }

    pub fn texture_view(&self, texture: &Arc<Texture>, view_type: TextureViewType) -> Arc<TextureView> {
        let name = format!("{}:{:?}", texture.name(), view_type);
        self.device.create_texture_view(texture, TextureViewDesc::new(name, view_type)).unwrap()
    }

    pub fn buffer_view(&self, buffer: &Arc<Buffer>, view_type: BufferViewType) -> Arc<BufferView> {
        let name = format!("{}:{:?}", buffer.name(), view_type);
        self.device.create_buffer_view(buffer, BufferViewDesc::new(name, view_type)).unwrap()
    }

    pub fn texture_srv(&self, name: &str) -> Arc<TextureView> {
        self.texture_view(&self.rw_texture(name), TextureViewType::ShaderResource)
    }

    pub fn texture_srv_with_sampler(&self, name: &str, sampler: &Arc<Sampler>) -> Arc<TextureView> {
        let texture = self.rw_texture(name);
        let desc = TextureViewDesc::new(format!("{}:srv", name), TextureViewType::ShaderResource)
            .with_sampler(sampler.clone());
        self.device.create_texture_view(&texture, desc).unwrap()
    }

    pub fn texture_uav(&self, name: &str) -> Arc<TextureView> {
        self.texture_view(&self.rw_texture(name), TextureViewType::UnorderedAccess)
    }

    pub fn buffer_srv(&self, name: &str) -> Arc<BufferView> {
        self.buffer_view(&self.rw_buffer(name), BufferViewType::ShaderResource)
    }

    pub fn buffer_uav(&self, name: &str) -> Arc<BufferView> {
        self.buffer_view(&self.rw_buffer(name), BufferViewType::UnorderedAccess)
    }
}
