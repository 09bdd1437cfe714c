use crate::error::AppError;
use std::time::Duration;
use uuid::Uuid;

// Use the MQTT v5 API surface only
use rumqttc::v5 as mqtt5;
use rumqttc::Transport;

// Re-export types so the rest of the code can use these names
pub type MqttOptions = mqtt5::MqttOptions;
pub type AsyncClient = mqtt5::AsyncClient;
pub type EventLoop = mqtt5::EventLoop;
pub type V5Publish = mqtt5::mqttbytes::v5::Publish;

pub fn build_options(
    host: &str,
    port: u16,
    username: &Option<String>,
    password: &Option<String>,
    keep_alive_secs: u64,
) -> MqttOptions {
    let client_id = format!("sensor-hub-{}", Uuid::new_v4());
    let mut opts = MqttOptions::new(client_id, host, port);
    opts.set_keep_alive(Duration::from_secs(keep_alive_secs));
    // Persistent session so the broker keeps our subscriptions across
    // reconnects.
    opts.set_clean_start(false);
    if let (Some(u), Some(p)) = (username, password) {
        opts.set_credentials(u.clone(), p.clone());
    }
    if port == 8883 {
        opts.set_transport(Transport::tls_with_default_config());
    }
    opts
}

pub fn new(options: MqttOptions) -> (AsyncClient, EventLoop) {
    mqtt5::AsyncClient::new(options, 50)
}

pub fn qos(v: u8) -> mqtt5::mqttbytes::QoS {
    match v {
        2 => mqtt5::mqttbytes::QoS::ExactlyOnce,
        0 => mqtt5::mqttbytes::QoS::AtMostOnce,
        _ => mqtt5::mqttbytes::QoS::AtLeastOnce,
    }
}

/// Poll the event loop until the next application message arrives.
pub async fn next_publish(eventloop: &mut EventLoop) -> Result<Option<V5Publish>, AppError> {
    loop {
        match eventloop.poll().await {
            Ok(mqtt5::Event::Incoming(mqtt5::Incoming::Publish(p))) => return Ok(Some(p)),
            Ok(_) => continue,
            Err(e) => return Err(AppError::Transport(e.to_string())),
        }
    }
}

/// Poll the event loop until the broker acknowledges the connection.
pub async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), AppError> {
    loop {
        match eventloop.poll().await {
            Ok(mqtt5::Event::Incoming(mqtt5::Incoming::ConnAck(_))) => return Ok(()),
            Ok(_) => continue,
            Err(e) => return Err(AppError::Transport(e.to_string())),
        }
    }
}

/// MQTT topic filter matching with `+` and `#` wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let fseg: Vec<&str> = filter.split('/').collect();
    let tseg: Vec<&str> = topic.split('/').collect();
    for (i, f) in fseg.iter().enumerate() {
        match *f {
            "#" => return true,
            "+" => {
                if i >= tseg.len() {
                    return false;
                }
            }
            _ => {
                if i >= tseg.len() || *f != tseg[i] {
                    return false;
                }
            }
        }
    }
    fseg.len() == tseg.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_wildcards() {
        assert!(topic_matches("rtl_433/#", "rtl_433/Acurite-Tower/1234"));
        assert!(topic_matches("sensor/+/state", "sensor/livingroom/state"));
        assert!(!topic_matches("sensor/+/state", "sensor/livingroom"));
        assert!(!topic_matches("sensor/livingroom", "sensor/kitchen"));
        assert!(topic_matches("sensor/livingroom", "sensor/livingroom"));
    }

    #[test]
    fn qos_mapping() {
        use rumqttc::v5::mqttbytes::QoS;
        assert_eq!(qos(0), QoS::AtMostOnce);
        assert_eq!(qos(1), QoS::AtLeastOnce);
        assert_eq!(qos(2), QoS::ExactlyOnce);
        assert_eq!(qos(7), QoS::AtLeastOnce);
    }
}
