//! Backend round trips produced by the controller and their results.

use serde_json::Value;

use crate::backend::{ApiBackend, ApiError};
use crate::profiles::DbType;
use crate::request_tokens::RequestToken;
use crate::wire::{
    ConnectAck, ConnectRequest, ExecutionRequest, GenerationRequest, GenerationResult,
    MetadataResponse, QueryExecutionResult, SampleRequest, SamplesResponse,
};

/// A payload paired with the token that fences its response.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<T> {
    pub token: RequestToken,
    pub payload: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(Pending<ConnectRequest>),
    Disconnect,
    Extract(RequestToken),
    Samples(Pending<SampleRequest>),
    Generate(Pending<GenerationRequest>),
    Execute(Pending<ExecutionRequest>),
    SampleMetadata(Pending<DbType>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Connected {
        token: RequestToken,
        outcome: Result<ConnectAck, ApiError>,
    },
    Disconnected(Result<(), ApiError>),
    Extracted {
        token: RequestToken,
        outcome: Result<MetadataResponse, ApiError>,
    },
    Sampled {
        token: RequestToken,
        outcome: Result<SamplesResponse, ApiError>,
    },
    Generated {
        token: RequestToken,
        outcome: Result<GenerationResult, ApiError>,
    },
    Executed {
        token: RequestToken,
        outcome: Result<QueryExecutionResult, ApiError>,
    },
    SampleMetadataLoaded {
        token: RequestToken,
        db_type: DbType,
        outcome: Result<Value, ApiError>,
    },
}

/// Performs the single network round trip of `call`. Never fails itself: the
/// outcome is carried in the returned [`Completion`].
pub async fn perform<B: ApiBackend + ?Sized>(backend: &B, call: Call) -> Completion {
    match call {
        Call::Connect(pending) => Completion::Connected {
            token: pending.token,
            outcome: backend.connect(&pending.payload).await,
        },
        Call::Disconnect => Completion::Disconnected(backend.disconnect().await),
        Call::Extract(token) => Completion::Extracted {
            token,
            outcome: backend.extract_metadata().await,
        },
        Call::Samples(pending) => Completion::Sampled {
            token: pending.token,
            outcome: backend.generate_samples(&pending.payload).await,
        },
        Call::Generate(pending) => Completion::Generated {
            token: pending.token,
            outcome: backend.generate_sql(&pending.payload).await,
        },
        Call::Execute(pending) => Completion::Executed {
            token: pending.token,
            outcome: backend.execute_query(&pending.payload).await,
        },
        Call::SampleMetadata(pending) => Completion::SampleMetadataLoaded {
            token: pending.token,
            db_type: pending.payload,
            outcome: backend.sample_metadata(pending.payload).await,
        },
    }
}
