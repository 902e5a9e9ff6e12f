pub mod health;
pub mod secret;
pub mod token;
pub mod vacancies;

pub use self::health::health;
pub use self::secret::secret;
pub use self::token::token;
pub use self::vacancies::{close_vacancy, get_vacancy, list_vacancies, open_vacancy};
