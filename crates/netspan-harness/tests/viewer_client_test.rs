//! End-to-end test of the viewer engine against a real hub.

use netspan_harness::{RegisteredClient, SimListener, sample_record};
use netspan_proto::ClientHello;
use netspan_viewer::{ViewerClient, ViewerEvent};

const HUB: &str = "hub:9090";

#[test]
fn viewer_engine_sees_registration_then_grouped_logs() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("hub", || async {
        let listener = SimListener::bind(9090).await?;
        netspan_hub::serve(listener).await?;
        Ok(())
    });

    sim.client("scenario", async {
        let stream = turmoil::net::TcpStream::connect(HUB).await?;
        let mut viewer = ViewerClient::from_stream(stream, "ops-console");

        // The hub's hello precedes everything else on the channel.
        let registered = viewer.next_event().await;
        let Some(ViewerEvent::Registered { ssid: viewer_ssid, .. }) = registered else {
            return Err(format!("expected registration, got {registered:?}").into());
        };
        assert_eq!(viewer_ssid, 1);

        let mut sniffer =
            RegisteredClient::connect(HUB, ClientHello::sniffer("edge", "en0")).await?;
        for seq in 1..=3 {
            sniffer.send_record(sample_record(seq)).await?;
        }

        for seq in 1..=3 {
            match viewer.next_event().await {
                Some(ViewerEvent::Log { ssid, record }) => {
                    assert_eq!(ssid, sniffer.ssid());
                    assert_eq!(record.icmp_seq, Some(seq));
                },
                other => return Err(format!("expected log {seq}, got {other:?}").into()),
            }
        }

        Ok(())
    });

    sim.run().expect("simulation failed");
}
