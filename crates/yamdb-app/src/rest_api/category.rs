use yamdb_dal::category::{CategoryRepository, CreateCategory};

crate::slug_api!(CategoryRepository, CreateCategory);
