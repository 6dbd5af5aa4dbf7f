use aws_config::BehaviorVersion;
use lambda_http::{run, service_fn, Error as LambdaError, Request as LambdaRequest};

use wandu_lambdas::api::handle_create;
use wandu_lambdas::common::utils::init_tracing;
use wandu_lambdas::{Services, Settings};

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    let settings = Settings::from_env()?;
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let services = Services::from_sdk_config(&config, &settings);

    run(service_fn(|request: LambdaRequest| handle_create(request, &services))).await
}
