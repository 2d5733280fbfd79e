use backend::build_rocket;
use backend::config::{
    create_app_state, create_cors, init_logger, load_environment, BACKEND_COMPONENT,
};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    load_environment();
    init_logger(BACKEND_COMPONENT);

    let state = create_app_state().await?;
    let cors = create_cors()?;

    let _rocket = build_rocket(state).attach(cors).launch().await?;
    Ok(())
}
