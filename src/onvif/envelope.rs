//! SOAP envelopes for the WS-BaseNotification subscription calls.

use chrono::{DateTime, Utc};
use uuid::Uuid;

const ENVELOPE_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<e:Envelope
	xmlns:e="http://www.w3.org/2003/05/soap-envelope"
	xmlns:wsnt="http://docs.oasis-open.org/wsn/b-2"
	xmlns:wsa5="http://www.w3.org/2005/08/addressing">"#;

const ACTION_BASE: &str = "http://docs.oasis-open.org/wsn/bw-2/NotificationProducer";

/// UTC with five fractional digits, e.g. `2024-03-01T10:15:00.12345Z`
pub fn format_soap_time(time: DateTime<Utc>) -> String {
    let fraction = time.timestamp_subsec_nanos().min(999_999_999) / 10_000;
    format!("{}.{:05}Z", time.format("%Y-%m-%dT%H:%M:%S"), fraction)
}

pub fn new_message_id() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}

fn render(message_id: &str, action: &str, body: &str) -> String {
    format!(
        r#"{open}
	<e:Header>
		<wsa5:MessageID>{message_id}</wsa5:MessageID>
		<wsa5:Action e:mustUnderstand="true">{base}/{action}</wsa5:Action>
	</e:Header>
	<e:Body>
{body}
	</e:Body>
</e:Envelope>
"#,
        open = ENVELOPE_OPEN,
        message_id = message_id,
        base = ACTION_BASE,
        action = action,
        body = body,
    )
}

pub fn render_subscribe(message_id: &str, callback_url: &str, expiration: DateTime<Utc>) -> String {
    let body = format!(
        r#"		<wsnt:Subscribe>
			<wsnt:ConsumerReference>
				<wsa5:Address>{}</wsa5:Address>
			</wsnt:ConsumerReference>
			<wsnt:InitialTerminationTime>{}</wsnt:InitialTerminationTime>
		</wsnt:Subscribe>"#,
        callback_url,
        format_soap_time(expiration)
    );
    render(message_id, "SubscribeRequest", &body)
}

pub fn render_renew(message_id: &str, expiration: DateTime<Utc>) -> String {
    let body = format!(
        r#"		<wsnt:Renew>
			<wsnt:TerminationTime>{}</wsnt:TerminationTime>
		</wsnt:Renew>"#,
        format_soap_time(expiration)
    );
    render(message_id, "RenewRequest", &body)
}

pub fn render_unsubscribe(message_id: &str) -> String {
    render(
        message_id,
        "UnsubscribeRequest",
        "\t\t<wsnt:Unsubscribe></wsnt:Unsubscribe>",
    )
}
