use af_core::ErrorClass;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("legacy state is corrupt: {0}")]
    LegacyStateCorrupt(String),

    #[error("no such builder: {0}")]
    NoSuchBuilder(String),

    #[error("no such utility terminal: {0}")]
    NoSuchUtil(String),

    #[error("no such annotation: {0}")]
    NoSuchAnnotation(String),

    #[error("port {0} is already registered to another project")]
    PortConflict(u16),

    #[error("no free base port in the 4200-9900 range (all 58 blocks claimed)")]
    RegistryExhausted,
}

impl DbError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DbError::NoSuchBuilder(_) | DbError::NoSuchUtil(_) | DbError::NoSuchAnnotation(_) => {
                ErrorClass::Operator
            }
            DbError::PortConflict(_) => ErrorClass::Conflict,
            DbError::RegistryExhausted => ErrorClass::Exhausted,
            DbError::LegacyStateCorrupt(_) => ErrorClass::Corruption,
            DbError::Sqlx(_) | DbError::Migrate(_) | DbError::Io(_) => ErrorClass::Corruption,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
