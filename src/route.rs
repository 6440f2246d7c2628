/// Screens the client can navigate between
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Session(String),
    Result(String),
}

impl Route {
    /// Path of the equivalent web route, used in logs
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Session(id) => format!("/game/{}", id),
            Route::Result(id) => format!("/game/{}/result", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths() {
        assert_eq!(Route::Home.path(), "/");
        assert_eq!(Route::Session("abc".into()).path(), "/game/abc");
        assert_eq!(Route::Result("abc".into()).path(), "/game/abc/result");
    }
}
