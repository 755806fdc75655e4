use yamdb_dal::genre::{CreateGenre, GenreRepository};

crate::slug_api!(GenreRepository, CreateGenre);
