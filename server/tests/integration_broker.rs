//! Integration-Tests: zusammengesetzter Broker (Konfiguration, Health, TCP-Bus)

use empowerly_broker::{config::BrokerConfig, Broker};
use empowerly_signaling::{
    KanalConfig, KanalEreignis, SignalingChannel, TcpBusConfig, TcpBusConnector,
};
use serde_json::json;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

fn test_config() -> BrokerConfig {
    let mut config = BrokerConfig::default();
    config.netzwerk.bind_adresse = "127.0.0.1".into();
    config.netzwerk.tcp_port = 0;
    config.observability.aktiviert = false;
    config
}

async fn warte_bis(mut bedingung: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(3), async {
        while !bedingung() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Bedingung nicht erreicht");
}

#[tokio::test]
async fn broker_relaisiert_und_faehrt_herunter() {
    let broker = Broker::neu(test_config()).unwrap();
    let state = broker.state().clone();
    let health = broker.health().clone();
    assert!(!health.bus_bereit());

    let gebunden = broker.binden().await.unwrap();
    let adresse = gebunden.lokale_adresse().unwrap().to_string();
    assert!(health.bus_bereit());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let lauf = tokio::spawn(gebunden.starten(shutdown_rx));

    let connector = TcpBusConnector::neu(
        &adresse,
        TcpBusConfig {
            heartbeat: Duration::from_millis(200),
            ..TcpBusConfig::default()
        },
    );
    let (kanal, mut ereignisse) = SignalingChannel::verbinden(
        connector,
        "meeting/m7",
        KanalConfig {
            reconnect_verzoegerung: Duration::from_millis(100),
        },
    );
    let verbunden = tokio::time::timeout(Duration::from_secs(3), ereignisse.recv())
        .await
        .expect("Timeout");
    assert_eq!(verbunden, Some(KanalEreignis::Verbunden));

    let (tx, mut rx) = mpsc::unbounded_channel();
    assert!(kanal.subscribe("join", tx));
    warte_bis(|| state.abonnenten("meeting/m7/join") == 1).await;

    // Der Broker stellt auch an den Absender zu
    assert!(kanal.publish("join", json!({"userId": "anna"})));
    let zustellung = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Timeout")
        .expect("Zustellung erwartet");
    assert_eq!(zustellung.body["userId"], "anna");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), lauf)
        .await
        .expect("Broker haelt nicht an")
        .unwrap()
        .unwrap();
    assert!(!health.bus_bereit());
    kanal.disconnect();
}

#[tokio::test]
async fn belegter_port_ist_fehler() {
    let erster = Broker::neu(test_config()).unwrap().binden().await.unwrap();
    let port = erster.lokale_adresse().unwrap().port();

    let mut config = test_config();
    config.netzwerk.tcp_port = port;
    let err = Broker::neu(config).unwrap().binden().await.err().unwrap();
    assert!(err.to_string().contains("nicht bindbar"));
}
