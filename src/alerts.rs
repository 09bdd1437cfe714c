use crate::config::{AlertsConfig, SmtpConfig};
use crate::error::{AppError, Result};
use crate::repositories::devices::DeviceActivity;
use crate::repositories::leak::WaterLeakDevice;
use crate::repositories::{DevicesRepository, WaterLeakRepository};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AlertKind {
    Inactive {
        last_seen: Option<DateTime<Utc>>,
        limit_minutes: i64,
    },
    LowBattery {
        level: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceAlert {
    pub device_name: String,
    pub kind: AlertKind,
}

/// Flag inactive and low-battery devices. Pure; the sweep feeds it snapshots.
pub fn collect_alerts(
    temperature: &[DeviceActivity],
    leaks: &[WaterLeakDevice],
    now: DateTime<Utc>,
    cfg: &AlertsConfig,
) -> Vec<DeviceAlert> {
    let mut alerts = Vec::new();

    for device in temperature {
        if !device.exclude_from_inactive_alerts {
            let limit = ChronoDuration::minutes(cfg.default_inactive_limit_minutes);
            let inactive = match device.last_seen {
                Some(last_seen) => now - last_seen > limit,
                None => true,
            };
            if inactive {
                alerts.push(DeviceAlert {
                    device_name: device.name.clone(),
                    kind: AlertKind::Inactive {
                        last_seen: device.last_seen,
                        limit_minutes: cfg.default_inactive_limit_minutes,
                    },
                });
            }
        }

        if let Some(level) = device.battery_level {
            if level < cfg.low_battery_threshold {
                alerts.push(DeviceAlert {
                    device_name: device.name.clone(),
                    kind: AlertKind::LowBattery { level },
                });
            }
        }
    }

    for leak in leaks {
        let limit = ChronoDuration::minutes(leak.inactive_limit_minutes as i64);
        let inactive = match leak.last_seen {
            Some(last_seen) => now - last_seen > limit,
            None => true,
        };
        if inactive {
            alerts.push(DeviceAlert {
                device_name: leak.name.clone(),
                kind: AlertKind::Inactive {
                    last_seen: leak.last_seen,
                    limit_minutes: leak.inactive_limit_minutes as i64,
                },
            });
        }
    }

    alerts
}

/// One summary per sweep. Lines are de-duplicated so a device never appears
/// twice for the same condition.
pub fn compose_summary(alerts: &[DeviceAlert]) -> (String, String) {
    let subject = format!(
        "Sensor alerts: {} device(s) need attention",
        alerts
            .iter()
            .map(|a| a.device_name.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    );

    let lines: BTreeSet<String> = alerts
        .iter()
        .map(|alert| match &alert.kind {
            AlertKind::Inactive {
                last_seen: Some(t),
                limit_minutes,
            } => format!(
                "{}: no reading since {} (limit {} min)",
                alert.device_name,
                t.format("%Y-%m-%d %H:%M UTC"),
                limit_minutes
            ),
            AlertKind::Inactive {
                last_seen: None,
                limit_minutes,
            } => format!(
                "{}: never reported (limit {} min)",
                alert.device_name, limit_minutes
            ),
            AlertKind::LowBattery { level } => {
                format!("{}: battery at {:.0}%", alert.device_name, level)
            }
        })
        .collect();

    let body = lines.into_iter().collect::<Vec<_>>().join("\n");
    (subject, body)
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(cfg: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .map_err(|e| AppError::Mail(e.to_string()))?
            .port(cfg.port);
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|_| AppError::Validation(format!("invalid from address: {}", cfg.from)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        if recipients.is_empty() {
            return Err(AppError::Validation("recipient list is empty".into()));
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject);
        for recipient in recipients {
            let to: Mailbox = recipient.parse().map_err(|_| {
                AppError::Validation(format!("invalid recipient address: {}", recipient))
            })?;
            builder = builder.to(to);
        }
        let message = builder
            .body(body.to_string())
            .map_err(|e| AppError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        Ok(())
    }
}

/// Send at most one summary email for a batch of alerts.
pub async fn deliver(alerts: &[DeviceAlert], recipients: &[String], mailer: &dyn Mailer) -> Result<()> {
    if alerts.is_empty() {
        return Ok(());
    }
    let (subject, body) = compose_summary(alerts);
    mailer.send(recipients, &subject, &body).await
}

/// Background pass over the device registries, default every 20 minutes.
pub struct AlertSweep {
    devices: Arc<DevicesRepository>,
    leaks: Arc<WaterLeakRepository>,
    mailer: Arc<dyn Mailer>,
    cfg: AlertsConfig,
}

impl AlertSweep {
    pub fn new(
        devices: Arc<DevicesRepository>,
        leaks: Arc<WaterLeakRepository>,
        mailer: Arc<dyn Mailer>,
        cfg: AlertsConfig,
    ) -> Self {
        Self {
            devices,
            leaks,
            mailer,
            cfg,
        }
    }

    /// Run until the task is aborted on shutdown. A partial pass is fine; the
    /// next tick catches up.
    pub async fn run(&self) {
        let interval = Duration::from_secs(self.cfg.interval_minutes * 60);
        info!("alert sweep started (interval: {:?})", interval);

        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so boot is quiet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                error!("alert sweep failed: {e}");
            }
        }
    }

    async fn sweep_once(&self) -> Result<()> {
        let temperature = self.devices.activity().await?;
        let leaks = self.leaks.get_all().await?;
        let alerts = collect_alerts(&temperature, &leaks, Utc::now(), &self.cfg);

        if alerts.is_empty() {
            return Ok(());
        }
        info!(count = alerts.len(), "sending alert summary");
        deliver(&alerts, &self.cfg.recipients, self.mailer.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn cfg() -> AlertsConfig {
        serde_yaml::from_str(
            r#"
            enabled: true
            interval_minutes: 20
            default_inactive_limit_minutes: 90
            low_battery_threshold: 15.0
            recipients: ["operator@example.com"]
            smtp:
              host: "smtp.example.com"
              from: "hub@example.com"
            "#,
        )
        .unwrap()
    }

    fn temp_device(name: &str, minutes_ago: Option<i64>, battery: Option<f64>) -> DeviceActivity {
        let now = Utc::now();
        DeviceActivity {
            id: 1,
            name: name.into(),
            exclude_from_inactive_alerts: false,
            last_seen: minutes_ago.map(|m| now - ChronoDuration::minutes(m)),
            battery_level: battery,
        }
    }

    struct RecordingMailer {
        sent: Mutex<Vec<(Vec<String>, String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((recipients.to_vec(), subject.into(), body.into()));
            Ok(())
        }
    }

    #[test]
    fn device_past_inactive_limit_is_flagged() {
        let devices = vec![temp_device("Garage", Some(120), None)];
        let alerts = collect_alerts(&devices, &[], Utc::now(), &cfg());

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].device_name, "Garage");
        assert!(matches!(
            alerts[0].kind,
            AlertKind::Inactive {
                limit_minutes: 90,
                ..
            }
        ));
    }

    #[test]
    fn recently_seen_device_is_not_flagged() {
        let devices = vec![temp_device("Garage", Some(30), Some(80.0))];
        let alerts = collect_alerts(&devices, &[], Utc::now(), &cfg());
        assert!(alerts.is_empty());
    }

    #[test]
    fn excluded_device_is_skipped_for_inactivity_but_not_battery() {
        let mut device = temp_device("Freezer", Some(500), Some(5.0));
        device.exclude_from_inactive_alerts = true;
        let alerts = collect_alerts(&[device], &[], Utc::now(), &cfg());

        assert_eq!(alerts.len(), 1);
        assert!(matches!(
            alerts[0].kind,
            AlertKind::LowBattery { level } if level == 5.0
        ));
    }

    #[test]
    fn leak_sensor_uses_its_own_limit() {
        let now = Utc::now();
        let leak = WaterLeakDevice {
            id: 1,
            name: "Basement leak".into(),
            mqtt_topic: "leak/basement".into(),
            inactive_limit_minutes: 60,
            last_seen: Some(now - ChronoDuration::minutes(90)),
        };
        let alerts = collect_alerts(&[], &[leak], now, &cfg());

        assert_eq!(alerts.len(), 1);
        assert!(matches!(
            alerts[0].kind,
            AlertKind::Inactive {
                limit_minutes: 60,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn one_email_per_sweep_listing_the_device() {
        // inactiveLimitMinutes=90, last reading 120 minutes ago.
        let devices = vec![temp_device("Livingroom", Some(120), None)];
        let alerts = collect_alerts(&devices, &[], Utc::now(), &cfg());

        let mailer = RecordingMailer {
            sent: Mutex::new(Vec::new()),
        };
        deliver(&alerts, &["operator@example.com".into()], &mailer)
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (recipients, subject, body) = &sent[0];
        assert_eq!(recipients, &vec!["operator@example.com".to_string()]);
        assert!(subject.contains("1 device(s)"));
        assert!(body.contains("Livingroom"));
    }

    #[tokio::test]
    async fn no_alerts_means_no_email() {
        let mailer = RecordingMailer {
            sent: Mutex::new(Vec::new()),
        };
        deliver(&[], &["operator@example.com".into()], &mailer)
            .await
            .unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn summary_deduplicates_identical_lines() {
        let alert = DeviceAlert {
            device_name: "Garage".into(),
            kind: AlertKind::LowBattery { level: 10.0 },
        };
        let (subject, body) = compose_summary(&[alert.clone(), alert]);
        assert!(subject.contains("1 device(s)"));
        assert_eq!(body.matches("Garage").count(), 1);
    }
}
