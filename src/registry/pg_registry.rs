use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entity::endpoint::{self, ActiveModel, Column, Entity as EndpointEntity};
use crate::error::{AppError, AppResult};
use crate::models::{normalize_path, CreateEndpoint, EndpointDefinition, HttpMethod};
use crate::registry::EndpointRegistry;

/// PostgreSQL-backed endpoint registry
#[derive(Clone)]
pub struct PgEndpointRegistry {
    db: DatabaseConnection,
}

impl PgEndpointRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EndpointRegistry for PgEndpointRegistry {
    async fn lookup(
        &self,
        user_slug: &str,
        path: &str,
        method: HttpMethod,
    ) -> AppResult<Option<EndpointDefinition>> {
        let model = EndpointEntity::find()
            .filter(Column::UserSlug.eq(user_slug))
            .filter(Column::Path.eq(normalize_path(path)))
            .filter(Column::HttpMethod.eq(method.as_str()))
            .one(&self.db)
            .await?;

        model.map(EndpointDefinition::try_from).transpose()
    }

    async fn create(&self, input: CreateEndpoint) -> AppResult<EndpointDefinition> {
        let definition = input.into_definition();
        let status_code = stored_status_code(definition.status_code)?;

        let model = ActiveModel {
            id: Set(definition.id),
            user_id: Set(definition.user_id),
            user_slug: Set(definition.user_slug.clone()),
            name: Set(definition.name.clone()),
            description: Set(definition.description.clone()),
            http_method: Set(definition.method.as_str().to_string()),
            path: Set(definition.path.clone()),
            request_schema: Set(definition.request_schema.clone()),
            response_schema: Set(definition.response_schema.clone()),
            status_code: Set(status_code),
            last_request_at: Set(None),
            created_at: Set(definition.created_at),
            updated_at: Set(definition.updated_at),
        };

        // A duplicate route inserts nothing and surfaces as RecordNotInserted
        let result = EndpointEntity::insert(model)
            .on_conflict(
                OnConflict::columns([Column::UserSlug, Column::Path, Column::HttpMethod])
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(|e| match e {
                DbErr::RecordNotInserted => AppError::Conflict("Endpoint".to_string()),
                other => other.into(),
            })?;
        tracing::info!(endpoint_id = %result.last_insert_id, path = %definition.path, "Endpoint registered");

        Ok(definition)
    }

    async fn mark_requested(&self, id: Uuid) -> AppResult<()> {
        EndpointEntity::update_many()
            .col_expr(
                Column::LastRequestAt,
                Expr::value(time::OffsetDateTime::now_utc()),
            )
            .filter(Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        Ok(())
    }
}

/// The column is SMALLINT; anything wider is a bad definition, not a bad schema
fn stored_status_code(status_code: u16) -> AppResult<i16> {
    i16::try_from(status_code)
        .map_err(|_| AppError::Internal(format!("Status code {} does not fit the endpoints table", status_code)))
}

// Conversion from SeaORM model to our domain model
impl TryFrom<endpoint::Model> for EndpointDefinition {
    type Error = AppError;

    fn try_from(m: endpoint::Model) -> Result<Self, Self::Error> {
        let method = m.http_method.parse::<HttpMethod>().map_err(AppError::Database)?;
        let status_code = u16::try_from(m.status_code)
            .map_err(|_| AppError::Database(format!("Invalid status code: {}", m.status_code)))?;

        Ok(Self {
            id: m.id,
            user_id: m.user_id,
            user_slug: m.user_slug,
            name: m.name,
            description: m.description,
            method,
            path: m.path,
            request_schema: m.request_schema,
            response_schema: m.response_schema,
            status_code,
            last_request_at: m.last_request_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_status_code_range() {
        assert_eq!(stored_status_code(201).unwrap(), 201);
        assert_eq!(stored_status_code(599).unwrap(), 599);

        let err = stored_status_code(40_000).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
