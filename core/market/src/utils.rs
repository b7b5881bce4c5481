pub mod lock;

pub use lock::KeyedLock;

pub mod response {
    use actix_web::HttpResponse;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Envelope<T> {
        data: T,
    }

    pub fn ok<T: Serialize>(data: T) -> HttpResponse {
        HttpResponse::Ok().json(Envelope { data })
    }

    pub fn created<T: Serialize>(data: T) -> HttpResponse {
        HttpResponse::Created().json(Envelope { data })
    }
}
