use super::WRITE_CHUNK;
use crate::entities::{authors, genres, studios, title_authors, title_genres, title_studios};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use std::collections::HashMap;
use std::fmt;

/// The named lookup tables a title links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupCategory {
    Genre,
    Studio,
    Author,
}

impl LookupCategory {
    pub const ALL: [Self; 3] = [Self::Genre, Self::Studio, Self::Author];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Genre => "genres",
            Self::Studio => "studios",
            Self::Author => "authors",
        }
    }
}

impl fmt::Display for LookupCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link from a title to a lookup row. `role` is only stored for authors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionLink {
    pub title_id: i32,
    pub lookup_id: i32,
    pub role: Option<String>,
}

/// Lookup tables share the `(id, unique name)` shape.
trait NamedLookup: EntityTrait {
    fn name_column() -> Self::Column;
    fn new_row(name: &str) -> Self::ActiveModel;
    fn key(model: &Self::Model) -> (String, i32);
}

impl NamedLookup for genres::Entity {
    fn name_column() -> genres::Column {
        genres::Column::Name
    }

    fn new_row(name: &str) -> genres::ActiveModel {
        genres::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
    }

    fn key(model: &genres::Model) -> (String, i32) {
        (model.name.clone(), model.id)
    }
}

impl NamedLookup for studios::Entity {
    fn name_column() -> studios::Column {
        studios::Column::Name
    }

    fn new_row(name: &str) -> studios::ActiveModel {
        studios::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
    }

    fn key(model: &studios::Model) -> (String, i32) {
        (model.name.clone(), model.id)
    }
}

impl NamedLookup for authors::Entity {
    fn name_column() -> authors::Column {
        authors::Column::Name
    }

    fn new_row(name: &str) -> authors::ActiveModel {
        authors::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
    }

    fn key(model: &authors::Model) -> (String, i32) {
        (model.name.clone(), model.id)
    }
}

async fn find_named<E, C>(conn: &C, names: &[String]) -> Result<HashMap<String, i32>, DbErr>
where
    E: NamedLookup,
    C: ConnectionTrait,
{
    let mut ids = HashMap::with_capacity(names.len());
    for chunk in names.chunks(WRITE_CHUNK * 10) {
        let rows = E::find()
            .filter(E::name_column().is_in(chunk.iter().cloned()))
            .all(conn)
            .await?;
        ids.extend(rows.iter().map(E::key));
    }
    Ok(ids)
}

/// Returns the id of every name, inserting the ones not seen before.
///
/// A name that cannot be read back is reported as `RecordNotFound(name)`.
async fn resolve_named<E, C>(conn: &C, names: &[String]) -> Result<HashMap<String, i32>, DbErr>
where
    E: NamedLookup,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelTrait<Entity = E>,
    C: ConnectionTrait,
{
    if names.is_empty() {
        return Ok(HashMap::new());
    }

    let mut ids = find_named::<E, C>(conn, names).await?;

    let mut missing: Vec<String> = names
        .iter()
        .filter(|name| !ids.contains_key(*name))
        .cloned()
        .collect();
    missing.sort();
    missing.dedup();

    if missing.is_empty() {
        return Ok(ids);
    }

    for chunk in missing.chunks(WRITE_CHUNK) {
        E::insert_many(chunk.iter().map(|name| E::new_row(name)))
            .on_conflict(OnConflict::column(E::name_column()).do_nothing().to_owned())
            .exec_without_returning(conn)
            .await?;
    }

    ids.extend(find_named::<E, C>(conn, &missing).await?);

    if let Some(name) = missing.iter().find(|name| !ids.contains_key(*name)) {
        return Err(DbErr::RecordNotFound(name.clone()));
    }

    Ok(ids)
}

pub struct LookupRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> LookupRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Maps every name to its row id, creating rows for unknown names.
    pub async fn resolve(
        &self,
        category: LookupCategory,
        names: &[String],
    ) -> Result<HashMap<String, i32>, DbErr> {
        match category {
            LookupCategory::Genre => resolve_named::<genres::Entity, C>(self.conn, names).await,
            LookupCategory::Studio => resolve_named::<studios::Entity, C>(self.conn, names).await,
            LookupCategory::Author => resolve_named::<authors::Entity, C>(self.conn, names).await,
        }
    }

    /// Replaces the links of every title in `title_ids` with `links`.
    ///
    /// Titles in `title_ids` without any entry in `links` end up with no links.
    pub async fn replace_links(
        &self,
        category: LookupCategory,
        title_ids: &[i32],
        links: &[JunctionLink],
    ) -> Result<(), DbErr> {
        if title_ids.is_empty() {
            return Ok(());
        }

        match category {
            LookupCategory::Genre => {
                title_genres::Entity::delete_many()
                    .filter(title_genres::Column::TitleId.is_in(title_ids.iter().copied()))
                    .exec(self.conn)
                    .await?;

                for chunk in links.chunks(WRITE_CHUNK) {
                    title_genres::Entity::insert_many(chunk.iter().map(|link| {
                        title_genres::ActiveModel {
                            title_id: Set(link.title_id),
                            genre_id: Set(link.lookup_id),
                        }
                    }))
                    .on_conflict(
                        OnConflict::columns([
                            title_genres::Column::TitleId,
                            title_genres::Column::GenreId,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self.conn)
                    .await?;
                }
            }
            LookupCategory::Studio => {
                title_studios::Entity::delete_many()
                    .filter(title_studios::Column::TitleId.is_in(title_ids.iter().copied()))
                    .exec(self.conn)
                    .await?;

                for chunk in links.chunks(WRITE_CHUNK) {
                    title_studios::Entity::insert_many(chunk.iter().map(|link| {
                        title_studios::ActiveModel {
                            title_id: Set(link.title_id),
                            studio_id: Set(link.lookup_id),
                        }
                    }))
                    .on_conflict(
                        OnConflict::columns([
                            title_studios::Column::TitleId,
                            title_studios::Column::StudioId,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self.conn)
                    .await?;
                }
            }
            LookupCategory::Author => {
                title_authors::Entity::delete_many()
                    .filter(title_authors::Column::TitleId.is_in(title_ids.iter().copied()))
                    .exec(self.conn)
                    .await?;

                for chunk in links.chunks(WRITE_CHUNK) {
                    title_authors::Entity::insert_many(chunk.iter().map(|link| {
                        title_authors::ActiveModel {
                            title_id: Set(link.title_id),
                            author_id: Set(link.lookup_id),
                            role: Set(link.role.clone()),
                        }
                    }))
                    .on_conflict(
                        OnConflict::columns([
                            title_authors::Column::TitleId,
                            title_authors::Column::AuthorId,
                        ])
                        .update_column(title_authors::Column::Role)
                        .to_owned(),
                    )
                    .exec_without_returning(self.conn)
                    .await?;
                }
            }
        }

        Ok(())
    }

    /// Names linked to a title, sorted alphabetically.
    pub async fn names_for_title(
        &self,
        category: LookupCategory,
        title_id: i32,
    ) -> Result<Vec<String>, DbErr> {
        match category {
            LookupCategory::Genre => {
                genres::Entity::find()
                    .select_only()
                    .column(genres::Column::Name)
                    .join(JoinType::InnerJoin, genres::Relation::TitleGenres.def())
                    .filter(title_genres::Column::TitleId.eq(title_id))
                    .order_by_asc(genres::Column::Name)
                    .into_tuple()
                    .all(self.conn)
                    .await
            }
            LookupCategory::Studio => {
                studios::Entity::find()
                    .select_only()
                    .column(studios::Column::Name)
                    .join(JoinType::InnerJoin, studios::Relation::TitleStudios.def())
                    .filter(title_studios::Column::TitleId.eq(title_id))
                    .order_by_asc(studios::Column::Name)
                    .into_tuple()
                    .all(self.conn)
                    .await
            }
            LookupCategory::Author => {
                authors::Entity::find()
                    .select_only()
                    .column(authors::Column::Name)
                    .join(JoinType::InnerJoin, authors::Relation::TitleAuthors.def())
                    .filter(title_authors::Column::TitleId.eq(title_id))
                    .order_by_asc(authors::Column::Name)
                    .into_tuple()
                    .all(self.conn)
                    .await
            }
        }
    }

    pub async fn count(&self, category: LookupCategory) -> Result<u64, DbErr> {
        match category {
            LookupCategory::Genre => genres::Entity::find().count(self.conn).await,
            LookupCategory::Studio => studios::Entity::find().count(self.conn).await,
            LookupCategory::Author => authors::Entity::find().count(self.conn).await,
        }
    }
}
