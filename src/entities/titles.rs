use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "titles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub external_id: i32,
    pub kind: String,
    pub title: String,
    pub title_romaji: Option<String>,
    pub title_english: Option<String>,
    pub title_native: Option<String>,
    pub synonyms: Option<String>, // JSON array stored as string
    pub description: Option<String>,
    pub status: Option<String>,
    pub score: Option<f32>,
    pub popularity: Option<i32>,
    pub favourites: Option<i32>,
    pub cover_image: Option<String>,
    pub banner_image: Option<String>,
    pub mal_id: Option<i32>,
    pub country_of_origin: Option<String>,
    pub site_url: Option<String>,
    /// Unix seconds of the catalog's last modification.
    pub source_updated_at: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::anime_details::Entity")]
    AnimeDetails,
    #[sea_orm(has_one = "super::manga_details::Entity")]
    MangaDetails,
    #[sea_orm(has_many = "super::title_genres::Entity")]
    TitleGenres,
    #[sea_orm(has_many = "super::title_studios::Entity")]
    TitleStudios,
    #[sea_orm(has_many = "super::title_authors::Entity")]
    TitleAuthors,
}

impl Related<super::anime_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnimeDetails.def()
    }
}

impl Related<super::manga_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MangaDetails.def()
    }
}

impl Related<super::genres::Entity> for Entity {
    fn to() -> RelationDef {
        super::title_genres::Relation::Genre.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::title_genres::Relation::Title.def().rev())
    }
}

impl Related<super::studios::Entity> for Entity {
    fn to() -> RelationDef {
        super::title_studios::Relation::Studio.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::title_studios::Relation::Title.def().rev())
    }
}

impl Related<super::authors::Entity> for Entity {
    fn to() -> RelationDef {
        super::title_authors::Relation::Author.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::title_authors::Relation::Title.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
