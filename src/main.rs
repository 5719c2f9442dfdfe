//! murmur command-line entry point
//!
//! Runs one retrieval operation against the configured SQLite database and
//! prints the result, either as a one-line summary per entity or as the
//! projected JSON.

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use murmur::entities::{BlogPost, Comment, MicroPost, User, default_registry};
use murmur::orm::Entity;
use murmur::{Config, Database, MetadataRegistry, Model, Projected, Request, SqliteStore, UniqueKey};

use crate::cli::{CliOptions, Lookup, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let options = CliOptions::from_args()?;
    if options.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let Some(kind) = options.kind.clone() else {
        eprintln!("{}", USAGE);
        bail!("missing entity kind");
    };

    let db = Database::connect(&config.database_path, config.max_connections).await?;
    let registry = Arc::new(default_registry());

    tracing::info!(
        kind = %kind,
        database = %config.database_path.display(),
        "Running retrieval"
    );

    let output = match kind.as_str() {
        "user" | "users" => run::<User>(&db, &registry, &config, &options).await?,
        "micro-post" | "micro-posts" => run::<MicroPost>(&db, &registry, &config, &options).await?,
        "blog-post" | "blog-posts" => run::<BlogPost>(&db, &registry, &config, &options).await?,
        "comment" | "comments" => run::<Comment>(&db, &registry, &config, &options).await?,
        other => bail!("unknown entity kind {}", other),
    };

    println!("{}", output);
    Ok(())
}

async fn run<E: Entity>(
    db: &Database,
    registry: &Arc<MetadataRegistry>,
    config: &Config,
    options: &CliOptions,
) -> Result<String> {
    let store: SqliteStore<E> = db.store();
    if options.init {
        store
            .create_table()
            .await
            .with_context(|| format!("Failed to create table {}", E::metadata().table))?;
    }

    let model = Model::new(store, registry.clone()).with_config(config);
    let request = build_request(options);

    let output = match &options.lookup {
        Lookup::Id(id) => one(model.find_by_id(*id, &request).await?),
        Lookup::Slug(slug) => one(
            model
                .find_by_unique_key(&UniqueKey::slug(slug.as_str()), &request)
                .await?,
        ),
        Lookup::Uuid(uuid) => one(
            model
                .find_by_unique_key(&UniqueKey::uuid(uuid.as_str()), &request)
                .await?,
        ),
        Lookup::ShortUuid(short) => one(model.find_by_encoded_uuid(short, &request).await?),
        Lookup::All => many(model.find_all(&request).await?),
        Lookup::Trashed => many(model.get_trashed_only(&request).await?),
        Lookup::Unpublished => many(model.get_unpublished_only(&request).await?),
    };

    Ok(output)
}

fn build_request(options: &CliOptions) -> Request {
    let mut request = Request::new()
        .as_json(options.json)
        .groups(options.groups.iter().cloned());

    match (options.page, options.per_page) {
        (Some(page), Some(per_page)) => request = request.paginate(page, per_page),
        (Some(page), None) => request = request.page(page),
        (None, Some(per_page)) => request = request.paginate(1, per_page),
        (None, None) => {}
    }

    request
}

fn one<E: Entity>(projected: Projected<E>) -> String {
    match projected {
        Projected::Native(entity) => describe(&entity),
        Projected::Json(json) => json,
    }
}

fn many<E: Entity>(projected: Projected<Vec<E>>) -> String {
    match projected {
        Projected::Native(entities) if entities.is_empty() => "(no results)".to_string(),
        Projected::Native(entities) => entities
            .iter()
            .map(describe)
            .collect::<Vec<_>>()
            .join("\n"),
        Projected::Json(json) => json,
    }
}

/// One-line summary: kind, id, keys and lifecycle state.
fn describe<E: Entity>(entity: &E) -> String {
    let mut line = format!("{} #{}", E::metadata().kind, entity.id());

    if let Some(slug) = entity.as_sluggable().and_then(|s| s.slug()) {
        line.push_str(&format!(" slug={}", slug));
    }
    if let Some(uuid) = entity
        .as_uniqable()
        .and_then(|u| u.uuid())
        .and_then(|u| uuid::Uuid::parse_str(u).ok())
    {
        line.push_str(&format!(" short={}", murmur::uuid_codec::encode(&uuid)));
    }
    if let Some(published) = entity.as_publishable() {
        line.push_str(if published.is_published() { " published" } else { " draft" });
    }
    if entity.as_trashable().is_some_and(|t| t.is_trashed()) {
        line.push_str(" trashed");
    }

    line
}
