//! Render endpoint enumeration via the MMDevice API.
//!
//! Lists the active render (speaker/headphone) endpoints whose mix a
//! loopback session can capture.

use thiserror::Error;
use windows::core::BSTR;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Foundation::PROPERTYKEY;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::UI::Shell::PropertiesSystem::IPropertyStore;

use crate::com::ComApartment;
use crate::endpoint::{EndpointTransport, LoopbackEndpoint};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnumerateError {
    #[error("COM initialization failed: {0}")]
    Com(String),

    #[error("{call} failed: {message}")]
    Call { call: &'static str, message: String },

    #[error("no default render endpoint")]
    NoDefaultEndpoint,
}

fn call_failed(call: &'static str) -> impl FnOnce(windows::core::Error) -> EnumerateError {
    move |e| EnumerateError::Call {
        call,
        message: e.to_string(),
    }
}

pub struct RenderEndpointEnumerator {
    enumerator: IMMDeviceEnumerator,
    // Dropped last.
    _apartment: ComApartment,
}

impl RenderEndpointEnumerator {
    pub fn new() -> Result<Self, EnumerateError> {
        let apartment = ComApartment::enter().map_err(|e| EnumerateError::Com(e.to_string()))?;
        let enumerator: IMMDeviceEnumerator = unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
            .map_err(call_failed("CoCreateInstance"))?;
        Ok(Self {
            enumerator,
            _apartment: apartment,
        })
    }

    pub fn default_endpoint_id(&self) -> Result<String, EnumerateError> {
        unsafe {
            let device = self
                .enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|_| EnumerateError::NoDefaultEndpoint)?;
            let id = device.GetId().map_err(call_failed("GetId"))?;
            Ok(id.to_string().unwrap_or_default())
        }
    }

    /// List active render endpoints.
    pub fn list(&self) -> Result<Vec<LoopbackEndpoint>, EnumerateError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE)
                .map_err(call_failed("EnumAudioEndpoints"))?;
            let count = collection.GetCount().map_err(call_failed("GetCount"))?;
            let default_id = self.default_endpoint_id().ok();

            let mut endpoints = Vec::new();
            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(_) => continue,
                };
                let id = match device.GetId() {
                    Ok(id) => id.to_string().unwrap_or_default(),
                    Err(_) => continue,
                };

                let store = device.OpenPropertyStore(STGM_READ).ok();
                let name = store
                    .as_ref()
                    .and_then(|s| read_string_property(s, &PKEY_Device_FriendlyName))
                    .unwrap_or_else(|| format!("Render endpoint {}", i));
                let transport = store
                    .as_ref()
                    .and_then(|s| read_string_property(s, &PKEY_Device_EnumeratorName))
                    .map_or(EndpointTransport::Unknown, |n| EndpointTransport::from_enumerator_name(&n));

                endpoints.push(LoopbackEndpoint {
                    is_default: default_id.as_deref() == Some(id.as_str()),
                    id,
                    name,
                    transport,
                });
            }

            log::debug!("Found {} active render endpoint(s)", endpoints.len());
            Ok(endpoints)
        }
    }
}

/// Read a string property; the returned `PROPVARIANT` clears itself on drop.
fn read_string_property(store: &IPropertyStore, key: &PROPERTYKEY) -> Option<String> {
    let value = unsafe { store.GetValue(key) }.ok()?;
    BSTR::try_from(&value).ok().map(|s| s.to_string())
}
