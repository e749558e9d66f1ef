//! Access policy table: required role and CSRF rule for every routed operation.

use axum::http::Method;

use crate::application::accounts::Principal;
use crate::domain::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    HomeIndex,
    PostIndex,
    HomePostsByCategory,
    AdminPostsByCategory,
    Search,
    CreatePost,
    EditPost,
    DeleteConfirm,
    DeleteById,
    FullNews,
    SaveImage,
    ErrorPage,
    LoginForm,
    Login,
    Logout,
    ServeUpload,
}

/// When a CSRF token must accompany the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfRule {
    Exempt,
    /// Checked on every method except GET, HEAD and OPTIONS.
    UnsafeMethods,
    Always,
}

impl CsrfRule {
    pub fn applies_to(self, method: &Method) -> bool {
        match self {
            CsrfRule::Exempt => false,
            CsrfRule::UnsafeMethods => {
                !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
            }
            CsrfRule::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub role: Option<Role>,
    pub csrf: CsrfRule,
}

/// Outcome of checking a caller against a policy's role requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleDecision {
    Allow,
    /// Anonymous caller on a protected operation; send them to sign in.
    Challenge,
    Forbid,
}

impl Operation {
    pub fn policy(self) -> AccessPolicy {
        use Operation::*;

        let (role, csrf) = match self {
            HomeIndex | PostIndex | HomePostsByCategory | FullNews | ErrorPage | LoginForm
            | ServeUpload => (None, CsrfRule::Exempt),
            Search | SaveImage | Login | Logout => (None, CsrfRule::UnsafeMethods),
            CreatePost | EditPost | DeleteConfirm | AdminPostsByCategory => {
                (Some(Role::Administrator), CsrfRule::UnsafeMethods)
            }
            DeleteById => (Some(Role::Administrator), CsrfRule::Always),
        };

        AccessPolicy { role, csrf }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::HomeIndex => "home_index",
            Operation::PostIndex => "post_index",
            Operation::HomePostsByCategory => "home_posts_by_category",
            Operation::AdminPostsByCategory => "admin_posts_by_category",
            Operation::Search => "search",
            Operation::CreatePost => "create_post",
            Operation::EditPost => "edit_post",
            Operation::DeleteConfirm => "delete_confirm",
            Operation::DeleteById => "delete_by_id",
            Operation::FullNews => "full_news",
            Operation::SaveImage => "save_image",
            Operation::ErrorPage => "error_page",
            Operation::LoginForm => "login_form",
            Operation::Login => "login",
            Operation::Logout => "logout",
            Operation::ServeUpload => "serve_upload",
        }
    }
}

impl AccessPolicy {
    pub fn check_role(&self, principal: Option<&Principal>) -> RoleDecision {
        match (self.role, principal) {
            (None, _) => RoleDecision::Allow,
            (Some(_), None) => RoleDecision::Challenge,
            (Some(role), Some(principal)) if principal.has_role(role) => RoleDecision::Allow,
            (Some(_), Some(_)) => RoleDecision::Forbid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: Uuid::nil(),
            email: "someone@example.com".to_string(),
            display_name: "Someone".to_string(),
            role,
        }
    }

    #[test]
    fn editorial_operations_require_administrator() {
        for operation in [
            Operation::CreatePost,
            Operation::EditPost,
            Operation::DeleteConfirm,
            Operation::DeleteById,
            Operation::AdminPostsByCategory,
        ] {
            assert_eq!(operation.policy().role, Some(Role::Administrator));
        }
    }

    #[test]
    fn public_pages_are_open_and_exempt() {
        for operation in [
            Operation::HomeIndex,
            Operation::PostIndex,
            Operation::HomePostsByCategory,
            Operation::FullNews,
            Operation::ErrorPage,
        ] {
            let policy = operation.policy();
            assert_eq!(policy.role, None);
            assert_eq!(policy.csrf, CsrfRule::Exempt);
        }
    }

    #[test]
    fn save_image_is_csrf_protected() {
        let policy = Operation::SaveImage.policy();
        assert!(policy.csrf.applies_to(&Method::POST));
        assert!(!policy.csrf.applies_to(&Method::GET));
    }

    #[test]
    fn delete_by_id_checks_csrf_on_every_method() {
        let rule = Operation::DeleteById.policy().csrf;
        assert!(rule.applies_to(&Method::GET));
        assert!(rule.applies_to(&Method::POST));
    }

    #[test]
    fn role_check_distinguishes_anonymous_from_unprivileged() {
        let policy = Operation::CreatePost.policy();

        assert_eq!(policy.check_role(None), RoleDecision::Challenge);
        assert_eq!(
            policy.check_role(Some(&principal(Role::User))),
            RoleDecision::Forbid
        );
        assert_eq!(
            policy.check_role(Some(&principal(Role::Administrator))),
            RoleDecision::Allow
        );
        assert_eq!(
            Operation::Search.policy().check_role(None),
            RoleDecision::Allow
        );
    }
}
