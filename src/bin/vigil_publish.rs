// Publishes one measurement onto the feed for manual testing.
//
// Usage: vigil-publish <sensor_id> <value> [broker_host] [broker_port]

use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, QoS};
use tokio::time::{timeout, Duration};
use vigil::SensorData;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        println!("Usage: {} <sensor_id> <value> [broker_host] [broker_port]", args[0]);
        println!("Example: {} TT-101 104.5 localhost 1883", args[0]);
        std::process::exit(1);
    }

    let sensor_id = args[1].clone();
    let value: f64 = args[2].parse()?;
    let host = args.get(3).map(String::as_str).unwrap_or("localhost");
    let port: u16 = match args.get(4) {
        Some(port) => port.parse()?,
        None => 1883,
    };

    let mut options = MqttOptions::new("vigil-publish", host, port);
    options.set_keep_alive(Duration::from_secs(5));
    let (client, mut eventloop) = AsyncClient::new(options, 10);

    let data = SensorData {
        sensor_id: sensor_id.clone(),
        value,
        timestamp_ms: Some(chrono::Utc::now().timestamp_millis()),
        quality: Some(1),
    };
    let topic = format!("enterprise/site1/area1/line1/device1/{}", sensor_id);
    client
        .publish(topic.as_str(), QoS::AtLeastOnce, false, serde_json::to_vec(&data)?)
        .await?;

    // Drive the connection until the publish has left the client
    timeout(Duration::from_secs(5), async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Publish(_))) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(e),
            }
        }
    })
    .await??;

    client.disconnect().await?;
    println!("Published to {}: {} = {}", topic, sensor_id, value);
    Ok(())
}
