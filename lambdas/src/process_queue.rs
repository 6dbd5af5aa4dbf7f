use aws_config::BehaviorVersion;
use aws_lambda_events::event::sqs::{SqsBatchResponse, SqsEvent};
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};

use wandu_lambdas::common::utils::init_tracing;
use wandu_lambdas::reconcile::process_event;
use wandu_lambdas::{Services, Settings};

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    let settings = Settings::from_env()?;
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let services = Services::from_sdk_config(&config, &settings);

    run(service_fn(|event: LambdaEvent<SqsEvent>| async {
        let response = process_event(event.payload, &services, &settings).await;
        Result::<SqsBatchResponse, LambdaError>::Ok(response)
    }))
    .await
}
