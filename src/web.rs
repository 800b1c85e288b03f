//! wasm entry point: boots the coordinator against the live document and
//! publishes it as `window.portfolioApp`.

use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::app::App;
use crate::host::web::WebHost;

/// Handle exposed to page scripts as `window.portfolioApp`.
#[wasm_bindgen]
pub struct PortfolioApp {
    app: Rc<App<WebHost>>,
}

#[wasm_bindgen]
impl PortfolioApp {
    /// Status snapshot of the coordinator and every module.
    #[wasm_bindgen(js_name = getStatus)]
    pub fn get_status(&self) -> JsValue {
        js_sys::JSON::parse(&self.app.status().to_string()).unwrap_or(JsValue::NULL)
    }

    /// Tear everything down and start again.
    pub fn restart(&self) -> Result<(), JsError> {
        self.app.restart().map_err(|e| JsError::new(&e.to_string()))
    }

    /// Release every listener, timer and frame.
    pub fn destroy(&self) {
        self.app.destroy();
    }
}

/// Boots the page behavior once the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("logger already installed");
    }

    let host = Rc::new(WebHost::new().map_err(|e| JsValue::from_str(&e.to_string()))?);
    let window = host.window().clone();
    let app = App::from_document(host);
    if let Err(e) = app.init() {
        log::error!("Portfolio failed to start: {e}");
    }

    let handle = PortfolioApp { app };
    let _ = js_sys::Reflect::set(
        &window,
        &JsValue::from_str("portfolioApp"),
        &JsValue::from(handle),
    )?;
    Ok(())
}
