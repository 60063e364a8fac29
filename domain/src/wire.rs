use serde::{Deserialize, Serialize};

/// Wire shape of the inbound `order_created` broker message, and of the job
/// pushed onto the pub/sub hint queue (minus `state`, which the queue
/// doesn't need — see `examples/original_source/internal/order_created/events_processor/daemon.go`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedMessage {
    pub event_uuid: String,
    pub order_uuid: String,
    pub number: String,
    #[serde(default)]
    pub state: String,
}

/// Wire shape of the outbound `accruals` topic envelope. Exactly one of
/// three variants, selected by the outbox daemon's tagged dispatch on the
/// originating event's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccrualProcessed {
    Started {
        event_uuid: String,
        order_uuid: String,
    },
    Finished {
        event_uuid: String,
        order_uuid: String,
        amount: i64,
    },
    Failed {
        event_uuid: String,
        order_uuid: String,
        error: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn order_created_message_round_trips_through_bincode() {
        let msg = OrderCreatedMessage {
            event_uuid: "E1".into(),
            order_uuid: "O1".into(),
            number: "42".into(),
            state: "NEW".into(),
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: OrderCreatedMessage = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn accrual_processed_variants_round_trip() {
        let variants = [
            AccrualProcessed::Started {
                event_uuid: "E1".into(),
                order_uuid: "O1".into(),
            },
            AccrualProcessed::Finished {
                event_uuid: "E1".into(),
                order_uuid: "O1".into(),
                amount: 1234,
            },
            AccrualProcessed::Failed {
                event_uuid: "E1".into(),
                order_uuid: "O1".into(),
                error: "boom".into(),
            },
        ];
        for variant in variants {
            let bytes = bincode::serialize(&variant).unwrap();
            let decoded: AccrualProcessed = bincode::deserialize(&bytes).unwrap();
            assert_eq!(decoded, variant);
        }
    }
}
