use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use newsdesk::{
    application::{
        accounts::{AccountService, CreateUserCommand},
        categories::CategoryService,
        error::AppError,
        images::ImageService,
        posts::PostService,
    },
    config::{self, CategoryCommand, Command, CreateCategoryArgs, CreateUserArgs, UserCommand},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState},
        telemetry,
        uploads::UploadStorage,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::User(args) => match args.command {
            UserCommand::Create(create) => run_create_user(settings, create).await,
        },
        Command::Category(args) => match args.command {
            CategoryCommand::Create(create) => run_create_category(settings, create).await,
        },
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_app_state(repositories, &settings)?;
    serve_http(&settings, state).await
}

async fn run_create_user(
    settings: config::Settings,
    args: CreateUserArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let accounts = AccountService::new(
        repositories.clone(),
        repositories,
        settings.auth.session_ttl,
    );

    let user = accounts
        .create_user(CreateUserCommand {
            email: args.email,
            display_name: args.display_name,
            password: args.password,
            role: args.role,
        })
        .await
        .map_err(|err| AppError::validation(err.to_string()))?;

    info!(
        target = "newsdesk::cli",
        user_id = %user.id,
        email = %user.email,
        role = %user.role,
        "user created"
    );
    Ok(())
}

async fn run_create_category(
    settings: config::Settings,
    args: CreateCategoryArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let categories = CategoryService::new(repositories.clone(), repositories);

    let category = categories
        .create(&args.name)
        .await
        .map_err(|err| AppError::validation(err.to_string()))?;

    info!(
        target = "newsdesk::cli",
        category_id = category.id,
        name = %category.name,
        "category created"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_app_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<AppState, AppError> {
    let uploads = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::from(err)))?,
    );
    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes does not fit in memory"))?;

    Ok(AppState {
        posts: Arc::new(PostService::new(
            repositories.clone(),
            repositories.clone(),
            uploads.clone(),
        )),
        categories: Arc::new(CategoryService::new(
            repositories.clone(),
            repositories.clone(),
        )),
        accounts: Arc::new(AccountService::new(
            repositories.clone(),
            repositories.clone(),
            settings.auth.session_ttl,
        )),
        images: Arc::new(ImageService::new(uploads.clone())),
        uploads,
        health: repositories,
        page_size: settings.listing.page_size,
        upload_limit_bytes,
        secure_cookies: settings.auth.secure_cookies,
    })
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "newsdesk::server",
        addr = %settings.server.addr,
        "listening"
    );

    let draining = Arc::new(Notify::new());
    let trigger = draining.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            trigger.notify_one();
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(&draining, grace) => {
            warn!(
                target = "newsdesk::server",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "newsdesk::server", "server stopped");
    Ok(())
}

async fn drain_deadline(draining: &Notify, grace: Duration) {
    draining.notified().await;
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "newsdesk::server", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "newsdesk::server", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "newsdesk::server", "shutdown signal received");
}
