slugged_entity!(
    Genre,
    CreateGenre,
    GenreRepositoryImpl,
    GenreRepository,
    "genre"
);
