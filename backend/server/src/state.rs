use std::sync::Arc;

use crate::{
    config::Config,
    fetch::{ImageFetcher, ImageProxy},
    relay::UploadRelay,
    response::ImageResponder,
};

pub struct AppState {
    pub config: Config,
    pub proxy: ImageProxy,
    pub relay: UploadRelay,
    pub responder: ImageResponder,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, reqwest::Error> {
        let proxy = ImageProxy::new(&config, config.origin_policy(), config.host_guard())?;
        let relay = UploadRelay::new(
            ImageFetcher::new(&config)?,
            &config.backend_origin,
            &config.upload_root,
        );
        let responder = ImageResponder::new(&config);

        Ok(Arc::new(Self {
            config,
            proxy,
            relay,
            responder,
        }))
    }
}
