pub mod prelude;

pub mod anime_details;
pub mod authors;
pub mod genres;
pub mod manga_details;
pub mod studios;
pub mod sync_state;
pub mod title_authors;
pub mod title_genres;
pub mod title_studios;
pub mod titles;
