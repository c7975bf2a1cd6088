//! VeSync cloud client for Etekcity WiFi outlets.
//!
//! Every switch call logs in, lists the account's devices and commands one
//! outlet. Nothing is cached between calls.

use chrono::Utc;
use md5::{Digest, Md5};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{ActuatorError, LightActuator};
use crate::config::{Credentials, VeSyncConfig};

const APP_VERSION: &str = "2.8.6";
const PHONE_BRAND: &str = "SM N9005";
const PHONE_OS: &str = "Android";
const USER_AGENT: &str = "okhttp/3.12.1";
const LANGUAGE: &str = "en";

const LOGIN_PATH: &str = "/cloud/v1/user/login";
const DEVICES_PATH: &str = "/cloud/v1/deviceManaged/devices";

/// Response wrapper shared by the VeSync JSON endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    token: String,
    #[serde(rename = "accountID")]
    account_id: String,
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    list: Vec<Device>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Device {
    device_name: String,
    device_type: String,
    cid: String,
    #[serde(default)]
    uuid: Option<String>,
}

/// Authenticated session for one switch call.
#[derive(Debug)]
struct Session {
    token: String,
    account_id: String,
}

/// Outlet models and the endpoint family each one is switched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutletModel {
    /// 7A round outlet, switched by URL path.
    Wifi7A,
    /// 10A outlets (US and EU).
    Outlet10A,
    /// 15A outlet with night light.
    Outlet15A,
}

impl OutletModel {
    fn from_device_type(device_type: &str) -> Option<Self> {
        match device_type {
            "wifi-switch-1.3" => Some(OutletModel::Wifi7A),
            "ESW01-EU" | "ESW03-USA" => Some(OutletModel::Outlet10A),
            "ESW15-USA" => Some(OutletModel::Outlet15A),
            _ => None,
        }
    }
}

/// Light actuator backed by a VeSync smart outlet.
pub struct VeSyncClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    time_zone: String,
    outlet_name: Option<String>,
}

impl VeSyncClient {
    /// Create a client. `timeout` bounds each HTTP request.
    pub fn new(
        config: &VeSyncConfig,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ActuatorError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        info!(
            "VeSync client initialized: endpoint={}, account={}",
            config.base_url, credentials.email
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            time_zone: config.time_zone.clone(),
            outlet_name: config.outlet_name.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fields every JSON request body carries.
    fn base_body(&self, method: &str) -> Value {
        json!({
            "acceptLanguage": LANGUAGE,
            "appVersion": APP_VERSION,
            "phoneBrand": PHONE_BRAND,
            "phoneOS": PHONE_OS,
            "timeZone": self.time_zone,
            "traceId": Utc::now().timestamp().to_string(),
            "userType": "1",
            "method": method,
        })
    }

    fn session_body(&self, method: &str, session: &Session) -> Value {
        let mut body = self.base_body(method);
        body["accountID"] = json!(session.account_id);
        body["token"] = json!(session.token);
        body
    }

    fn with_session_headers(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request
            .header("accept-language", LANGUAGE)
            .header("accountid", &session.account_id)
            .header("appversion", APP_VERSION)
            .header("tk", &session.token)
            .header("tz", &self.time_zone)
    }

    async fn login(&self) -> Result<Session, ActuatorError> {
        let mut body = self.base_body("login");
        body["email"] = json!(self.credentials.email);
        body["password"] = json!(hash_password(&self.credentials.password));
        body["devToken"] = json!("");

        let response = self.http.post(self.url(LOGIN_PATH)).json(&body).send().await?;
        let envelope: Envelope<LoginResult> = read_envelope(LOGIN_PATH, response).await?;

        match envelope {
            Envelope {
                code: 0,
                result: Some(result),
                ..
            } => {
                debug!("Logged in to VeSync as account {}", result.account_id);
                Ok(Session {
                    token: result.token,
                    account_id: result.account_id,
                })
            }
            Envelope { code, msg, .. } => Err(ActuatorError::Auth(format!(
                "code {}: {}",
                code,
                msg.unwrap_or_default()
            ))),
        }
    }

    async fn devices(&self, session: &Session) -> Result<Vec<Device>, ActuatorError> {
        let mut body = self.session_body("devices", session);
        body["pageNo"] = json!(1);
        body["pageSize"] = json!(100);

        let request = self.http.post(self.url(DEVICES_PATH)).json(&body);
        let response = self.with_session_headers(request, session).send().await?;
        let list: DeviceList = expect_result(DEVICES_PATH, read_envelope(DEVICES_PATH, response).await?)?;

        debug!("VeSync account has {} devices", list.list.len());
        Ok(list.list)
    }

    /// Pick the configured outlet, or the first supported one.
    fn select_outlet<'a>(&self, devices: &'a [Device]) -> Option<(&'a Device, OutletModel)> {
        devices
            .iter()
            .filter(|d| match &self.outlet_name {
                Some(name) => &d.device_name == name,
                None => true,
            })
            .find_map(|d| OutletModel::from_device_type(&d.device_type).map(|m| (d, m)))
    }

    async fn switch(
        &self,
        session: &Session,
        device: &Device,
        model: OutletModel,
        on: bool,
    ) -> Result<(), ActuatorError> {
        let status = if on { "on" } else { "off" };

        match model {
            OutletModel::Wifi7A => {
                let path = format!("/v1/wifi-switch-1.3/{}/status/{}", device.cid, status);
                let request = self.http.put(self.url(&path));
                let response = self.with_session_headers(request, session).send().await?;
                check_status(&path, &response)?;
            }
            OutletModel::Outlet10A | OutletModel::Outlet15A => {
                let path = match model {
                    OutletModel::Outlet15A => "/15a/v1/device/devicestatus",
                    _ => "/10a/v1/device/devicestatus",
                };
                let mut body = self.session_body("devicestatus", session);
                body["uuid"] = json!(device.uuid.as_deref().unwrap_or(&device.cid));
                body["status"] = json!(status);

                let request = self.http.put(self.url(path)).json(&body);
                let response = self.with_session_headers(request, session).send().await?;
                let envelope: Envelope<Value> = read_envelope(path, response).await?;
                check_code(path, &envelope)?;
            }
        }

        Ok(())
    }
}

impl LightActuator for VeSyncClient {
    async fn set_light_state(&self, on: bool) -> Result<(), ActuatorError> {
        let session = self.login().await?;
        let devices = self.devices(&session).await?;
        let (outlet, model) = self
            .select_outlet(&devices)
            .ok_or_else(|| ActuatorError::NoOutlet(self.outlet_name.clone()))?;

        self.switch(&session, outlet, model, on).await?;

        info!(
            "Turning light {} ({})",
            if on { "on" } else { "off" },
            outlet.device_name
        );
        Ok(())
    }
}

/// VeSync expects the hex MD5 digest of the password.
fn hash_password(password: &str) -> String {
    format!("{:x}", Md5::digest(password.as_bytes()))
}

fn check_status(endpoint: &str, response: &Response) -> Result<(), ActuatorError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ActuatorError::Status {
            endpoint: endpoint.to_string(),
            status,
        })
    }
}

async fn read_envelope<T: DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<Envelope<T>, ActuatorError> {
    check_status(endpoint, &response)?;
    Ok(response.json().await?)
}

fn check_code<T>(endpoint: &str, envelope: &Envelope<T>) -> Result<(), ActuatorError> {
    if envelope.code == 0 {
        Ok(())
    } else {
        Err(ActuatorError::Api {
            endpoint: endpoint.to_string(),
            code: envelope.code,
            msg: envelope.msg.clone().unwrap_or_default(),
        })
    }
}

fn expect_result<T>(endpoint: &str, envelope: Envelope<T>) -> Result<T, ActuatorError> {
    check_code(endpoint, &envelope)?;
    envelope.result.ok_or_else(|| ActuatorError::Api {
        endpoint: endpoint.to_string(),
        code: envelope.code,
        msg: "response has no result".to_string(),
    })
}
