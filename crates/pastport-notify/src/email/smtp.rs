//! SMTP email provider implementation.

use super::{EmailConfig, EmailError, EmailProvider, SendOutcome};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpProvider {
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let EmailConfig {
            host,
            port,
            username,
            password,
            use_tls,
            from_address,
            from_name,
        } = config;

        let mut builder = if use_tls {
            let tls_params = TlsParameters::new(host.clone())
                .map_err(|e| EmailError::InvalidConfig(format!("TLS configuration error: {}", e)))?;

            // Port 465 uses implicit TLS (SMTPS), other ports use STARTTLS
            if port == 465 {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
                    .map_err(|e| EmailError::InvalidConfig(format!("SMTP relay error: {}", e)))?
                    .port(port)
                    .tls(Tls::Wrapper(tls_params))
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
                    .map_err(|e| EmailError::InvalidConfig(format!("SMTP relay error: {}", e)))?
                    .port(port)
                    .tls(Tls::Required(tls_params))
            }
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host).port(port)
        };

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        let from = match from_name {
            Some(name) => format!("{} <{}>", name, from_address),
            None => from_address,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<SendOutcome, EmailError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| EmailError::InvalidConfig(format!("Invalid from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| EmailError::InvalidConfig(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| EmailError::SendFailed(format!("Failed to build email: {}", e)))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(SendOutcome::Sent {
            detail: response.code().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16, use_tls: bool, username: Option<&str>) -> EmailConfig {
        EmailConfig {
            host: "localhost".to_string(),
            port,
            username: username.map(String::from),
            password: username.map(|_| "pass".to_string()),
            use_tls,
            from_address: "capsules@pastport.example".to_string(),
            from_name: Some("PastPort".to_string()),
        }
    }

    #[test]
    fn provider_creation_no_tls() {
        assert!(SmtpProvider::new(config(25, false, None)).is_ok());
    }

    #[test]
    fn provider_creation_with_credentials() {
        assert!(SmtpProvider::new(config(587, false, Some("user"))).is_ok());
    }
}
