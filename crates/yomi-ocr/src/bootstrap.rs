use std::collections::HashMap;
use std::sync::Arc;

use yomi_config::ocr::OcrConfig;
use yomi_core::{OcrEngine, OcrError};
use yomi_types::OcrEngineKind;

/// Builds an uninitialized engine
pub type EngineFactory = Box<dyn Fn() -> Box<dyn OcrEngine> + Send + Sync>;

/// Creates and initializes the configured OCR engine
///
/// Engines are looked up by kind in a registry. When the selected engine is
/// missing or fails to initialize, the configured fallback kind is tried.
#[derive(Default)]
pub struct OcrEngineBootstrapper {
    factories: HashMap<OcrEngineKind, EngineFactory>,
}

impl OcrEngineBootstrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every engine this platform ships
    pub fn with_platform_engines() -> Self {
        #[allow(unused_mut)]
        let mut bootstrapper = Self::new();
        #[cfg(windows)]
        bootstrapper.register(OcrEngineKind::Windows, || {
            Box::new(crate::windows_engine::WindowsOcrEngine::new())
        });
        bootstrapper
    }

    pub fn register<F>(&mut self, kind: OcrEngineKind, factory: F)
    where
        F: Fn() -> Box<dyn OcrEngine> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    pub fn is_available(&self, kind: OcrEngineKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn create(&self, config: &OcrConfig) -> Result<Arc<dyn OcrEngine>, OcrError> {
        match self.create_kind(config.engine, config) {
            Ok(engine) => Ok(engine),
            Err(e) if config.allow_fallback && config.fallback_engine != config.engine => {
                tracing::warn!(
                    "[OCR] {} unavailable ({}), falling back to {}",
                    config.engine,
                    e,
                    config.fallback_engine
                );
                self.create_kind(config.fallback_engine, config)
            }
            Err(e) => Err(e),
        }
    }

    fn create_kind(
        &self,
        kind: OcrEngineKind,
        config: &OcrConfig,
    ) -> Result<Arc<dyn OcrEngine>, OcrError> {
        let factory = self
            .factories
            .get(&kind)
            .ok_or(OcrError::Unsupported(kind))?;

        let mut engine = factory();
        engine.initialize(&config.model_path, &config.language)?;
        if !engine.is_initialized() {
            return Err(OcrError::InitFailed {
                engine: engine.engine_name().to_string(),
                reason: "engine reported not initialized".to_string(),
            });
        }

        tracing::info!("[OCR] Engine ready: {}", engine.engine_name());
        Ok(Arc::from(engine))
    }
}
