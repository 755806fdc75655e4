slugged_entity!(
    Category,
    CreateCategory,
    CategoryRepositoryImpl,
    CategoryRepository,
    "category"
);
