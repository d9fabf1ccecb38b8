pub mod db;
pub mod entity;
pub mod identities_repo;
pub mod mapper;
pub mod migrations;
pub mod sea_orm_repo;
pub mod workers_repo;

pub use identities_repo::OrmIdentityStore;
pub use sea_orm_repo::OrmServicesRepository;
pub use workers_repo::OrmWorkerDirectory;
