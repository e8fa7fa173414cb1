//! Conversions between wire types and domain types

use crate::generated;
use mcp_gateway_core::{Error, Event};
use tonic::Status;

impl From<generated::Event> for Event {
    fn from(proto: generated::Event) -> Self {
        Event {
            event_id: proto.event_id,
            event_type: proto.event_type,
            source: proto.source,
            timestamp: proto.timestamp,
            data: proto.data,
            metadata: proto.metadata,
        }
    }
}

impl From<&Event> for generated::Event {
    fn from(event: &Event) -> Self {
        generated::Event {
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            source: event.source.clone(),
            timestamp: event.timestamp,
            data: event.data.clone(),
            metadata: event.metadata.clone(),
        }
    }
}

/// Map a gateway error onto the closest gRPC status
pub fn error_to_status(error: &Error) -> Status {
    match error {
        Error::InvalidArgument(msg) => Status::invalid_argument(msg.clone()),
        Error::NotFound(msg) => Status::not_found(msg.clone()),
        Error::AlreadyExists(msg) => Status::already_exists(msg.clone()),
        Error::Unavailable(msg) => Status::unavailable(msg.clone()),
        Error::Timeout { .. } => Status::deadline_exceeded(error.to_string()),
        other => Status::internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn event_round_trips_through_the_wire_shape() {
        let event = Event {
            event_id: "e1".into(),
            event_type: "user.created".into(),
            source: "auth".into(),
            timestamp: 1_700_000_000,
            data: r#"{"user_id":"123"}"#.into(),
            metadata: HashMap::from([("env".to_string(), "prod".to_string())]),
        };

        let wire: generated::Event = (&event).into();
        let back: Event = wire.into();
        assert_eq!(back, event);
    }

    #[test]
    fn statuses_map_by_error_kind() {
        assert_eq!(
            error_to_status(&Error::invalid_argument("data is empty")).code(),
            tonic::Code::InvalidArgument
        );
        assert_eq!(
            error_to_status(&Error::NotFound("t1".into())).code(),
            tonic::Code::NotFound
        );
        assert_eq!(
            error_to_status(&Error::AlreadyExists("t1".into())).code(),
            tonic::Code::AlreadyExists
        );
        assert_eq!(
            error_to_status(&Error::Unavailable("engine".into())).code(),
            tonic::Code::Unavailable
        );
        assert_eq!(
            error_to_status(&Error::internal("boom")).code(),
            tonic::Code::Internal
        );
    }
}
