use crate::authz::errors::AuthzError;
use crate::authz::store::PolicyStore;
use crate::authz::types::{Effect, GroupingEdge, PolicyRule};
use crate::entities;
use crate::errors::QuizgateError;
use crate::settings::Database as DbCfg;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, QuizgateError> {
    let db = Database::connect(&cfg.url).await?;
    Ok(db)
}

/// `PolicyStore` over the `policy_rules` and `grouping_edges` tables.
///
/// Every mutation is a single statement, committed before the call returns.
#[derive(Debug, Clone)]
pub struct SqlPolicyStore {
    db: DatabaseConnection,
}

impl SqlPolicyStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn rule_from_model(model: entities::policy_rule::Model) -> Result<PolicyRule, AuthzError> {
    let effect: Effect = model.effect.parse().map_err(|_| {
        AuthzError::StoreUnavailable(format!(
            "stored rule {} has invalid effect `{}`",
            model.id, model.effect
        ))
    })?;
    Ok(PolicyRule {
        subject: model.subject,
        object: model.object,
        action: model.action,
        attribute: model.attribute,
        effect,
        entity: model.entity,
    })
}

fn models_to_rules(
    models: Vec<entities::policy_rule::Model>,
) -> Result<Vec<PolicyRule>, AuthzError> {
    models.into_iter().map(rule_from_model).collect()
}

#[async_trait]
impl PolicyStore for SqlPolicyStore {
    async fn add_policy(&self, rule: &PolicyRule) -> Result<bool, AuthzError> {
        use entities::policy_rule::{ActiveModel, Column, Entity};

        let model = ActiveModel {
            subject: Set(rule.subject.clone()),
            object: Set(rule.object.clone()),
            action: Set(rule.action.clone()),
            attribute: Set(rule.attribute.clone()),
            effect: Set(rule.effect.as_str().to_string()),
            entity: Set(rule.entity.clone()),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };

        let result = Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    Column::Subject,
                    Column::Object,
                    Column::Action,
                    Column::Attribute,
                    Column::Entity,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(&self.db)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> Result<bool, AuthzError> {
        use entities::policy_rule::{Column, Entity};

        let result = Entity::delete_many()
            .filter(Column::Subject.eq(rule.subject.as_str()))
            .filter(Column::Object.eq(rule.object.as_str()))
            .filter(Column::Action.eq(rule.action.as_str()))
            .filter(Column::Attribute.eq(rule.attribute.as_str()))
            .filter(Column::Effect.eq(rule.effect.as_str()))
            .filter(Column::Entity.eq(rule.entity.as_str()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn policies(&self) -> Result<Vec<PolicyRule>, AuthzError> {
        use entities::policy_rule::{Column, Entity};

        let models = Entity::find()
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        models_to_rules(models)
    }

    async fn policies_for_subjects(
        &self,
        subjects: &[String],
    ) -> Result<Vec<PolicyRule>, AuthzError> {
        use entities::policy_rule::{Column, Entity};

        if subjects.is_empty() {
            return Ok(Vec::new());
        }
        let models = Entity::find()
            .filter(Column::Subject.is_in(subjects.iter().map(String::as_str)))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        models_to_rules(models)
    }

    async fn add_grouping(&self, edge: &GroupingEdge) -> Result<bool, AuthzError> {
        use entities::grouping_edge::{ActiveModel, Column, Entity};

        let model = ActiveModel {
            child: Set(edge.child.clone()),
            parent: Set(edge.parent.clone()),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };

        let result = Entity::insert(model)
            .on_conflict(
                OnConflict::columns([Column::Child, Column::Parent])
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&self.db)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_grouping(&self, edge: &GroupingEdge) -> Result<bool, AuthzError> {
        use entities::grouping_edge::{Column, Entity};

        let result = Entity::delete_many()
            .filter(Column::Child.eq(edge.child.as_str()))
            .filter(Column::Parent.eq(edge.parent.as_str()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn groupings(&self) -> Result<Vec<GroupingEdge>, AuthzError> {
        use entities::grouping_edge::{Column, Entity};

        let models = Entity::find()
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(|m| GroupingEdge::new(m.child, m.parent))
            .collect())
    }

    async fn parents_of(&self, child: &str) -> Result<Vec<String>, AuthzError> {
        use entities::grouping_edge::{Column, Entity};

        let models = Entity::find()
            .filter(Column::Child.eq(child))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(|m| m.parent).collect())
    }
}
