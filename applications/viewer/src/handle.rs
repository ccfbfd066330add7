use std::rc::Rc;

use tracing::{info, warn};
use viewer_framework::{Length, ModelViewer, ViewerConfig, ViewerProps};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlElement;

use crate::{
    error::{describe_js_error, ApplicationError, ApplicationResult},
    web_host::WebHost,
};

/// A model viewer mounted into an element of the page.
///
/// Dropping the handle (`free()` on the JavaScript side) unmounts the viewer.
#[wasm_bindgen]
pub struct ModelViewerHandle {
    viewer: ModelViewer<WebHost>,
}

#[wasm_bindgen]
impl ModelViewerHandle {
    /// Mounts a viewer into `container` and starts loading `locator`.
    ///
    /// `width` and `height` accept numbers (pixels) or CSS lengths and default to `100%` and
    /// `500px`. `config_json` may override any field of the viewer configuration.
    pub fn mount(
        container: HtmlElement,
        locator: String,
        width: JsValue,
        height: JsValue,
        config_json: Option<String>,
    ) -> Result<ModelViewerHandle, JsValue> {
        Self::try_mount(container, locator, &width, &height, config_json.as_deref())
            .map_err(JsValue::from)
    }

    /// Replaces the shown model. The previous model, its surface and listeners are released.
    pub fn set_model(&mut self, locator: String) -> Result<(), JsValue> {
        self.viewer
            .set_model(locator)
            .map_err(|error| JsValue::from(ApplicationError::from(error)))
    }

    pub fn set_size(&mut self, width: JsValue, height: JsValue) -> Result<(), JsValue> {
        let width = length_from_js(&width, ViewerProps::DEFAULT_WIDTH)?;
        let height = length_from_js(&height, ViewerProps::DEFAULT_HEIGHT)?;
        self.viewer.set_size(width, height);
        Ok(())
    }

    /// `"loading"`, `"loaded (… triangles)"`, `"failed: …"` or `"unmounted"`.
    #[must_use]
    pub fn status(&self) -> String {
        self.viewer
            .status()
            .map_or_else(|| "unmounted".to_owned(), |status| status.to_string())
    }

    /// Calls `callback` with a description of the current status and of every later change.
    ///
    /// Calls are queued as microtasks in the order the changes happened. They run after the
    /// method that caused the change has returned, so the callback may use the handle again.
    pub fn on_status(&mut self, callback: js_sys::Function) {
        self.viewer.on_status(move |status| {
            let callback = callback.clone();
            let description = JsValue::from_str(&status.to_string());
            spawn_local(async move {
                if let Err(error) = callback.call1(&JsValue::NULL, &description) {
                    warn!("status callback failed: {}", describe_js_error(&error));
                }
            });
        });
    }

    /// Releases the viewer. Calling it again has no effect.
    pub fn unmount(&mut self) {
        self.viewer.unmount();
    }
}

impl ModelViewerHandle {
    fn try_mount(
        container: HtmlElement,
        locator: String,
        width: &JsValue,
        height: &JsValue,
        config_json: Option<&str>,
    ) -> ApplicationResult<Self> {
        let config = config_json
            .map(ViewerConfig::from_json)
            .transpose()?
            .unwrap_or_default();
        let props = ViewerProps {
            locator,
            width: length_from_js(width, ViewerProps::DEFAULT_WIDTH)?,
            height: length_from_js(height, ViewerProps::DEFAULT_HEIGHT)?,
        };
        info!("mounting viewer for {}", props.locator);

        let host = Rc::new(WebHost::new(container)?);
        let viewer = ModelViewer::mount(host, props, config)?;
        Ok(Self { viewer })
    }
}

/// `undefined` and `null` select the default, numbers are pixels, strings are parsed as CSS
/// lengths.
fn length_from_js(value: &JsValue, default: Length) -> ApplicationResult<Length> {
    if value.is_undefined() || value.is_null() {
        return Ok(default);
    }
    if let Some(pixels) = value.as_f64() {
        if pixels.is_finite() && pixels >= 0.0 {
            return Ok(Length::Pixels(pixels));
        }
        return Err(ApplicationError::InvalidSize(pixels.to_string()));
    }
    if let Some(text) = value.as_string() {
        return Ok(text.parse()?);
    }
    Err(ApplicationError::InvalidSize(format!("{value:?}")))
}
