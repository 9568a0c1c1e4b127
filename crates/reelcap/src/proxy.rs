use reqwest::Proxy;

use crate::AcquireError;

/// Proxy configuration types
#[derive(Debug, Clone, PartialEq, Eq, Copy, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    /// HTTP proxy for every request, tunnelling HTTPS with CONNECT
    #[default]
    Http,
    /// Proxy only requests to `https://` origins
    Https,
    /// SOCKS5 proxy
    Socks5,
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy used for manifest, segment, and direct media fetches.
///
/// The browser capture layer does not go through this proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>, proxy_type: ProxyType) -> Self {
        Self {
            url: url.into(),
            proxy_type,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Build the reqwest proxy for this configuration.
    pub fn to_reqwest(&self) -> Result<Proxy, AcquireError> {
        let proxy_url = &self.url;

        let mut proxy = match self.proxy_type {
            ProxyType::Http => Proxy::all(proxy_url).map_err(|e| {
                AcquireError::configuration(format!("invalid HTTP proxy URL `{proxy_url}`: {e}"))
            })?,
            ProxyType::Https => Proxy::https(proxy_url).map_err(|e| {
                AcquireError::configuration(format!("invalid HTTPS proxy URL `{proxy_url}`: {e}"))
            })?,
            ProxyType::Socks5 => {
                let url =
                    if proxy_url.starts_with("socks5://") || proxy_url.starts_with("socks5h://") {
                        proxy_url.to_string()
                    } else {
                        format!("socks5://{proxy_url}")
                    };

                Proxy::all(&url).map_err(|e| {
                    AcquireError::configuration(format!("invalid SOCKS5 proxy URL `{url}`: {e}"))
                })?
            }
        };

        if let Some(auth) = &self.auth {
            proxy = proxy.basic_auth(&auth.username, &auth.password);
        }

        Ok(proxy)
    }
}
