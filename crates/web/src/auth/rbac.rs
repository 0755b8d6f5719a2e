//! Role-Based Access Control (RBAC) system.
//!
//! Editors only ask one question of this module: may the caller administer
//! course content. That question is answered through [`AccessOracle`].

use super::types::Caller;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Permission required to read or change anything behind an editor.
pub const COURSE_ADMIN: &str = "course:admin";

/// Permission to view published course content.
pub const COURSE_READ: &str = "course:read";

/// A role that can be assigned to identities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Unique role identifier (e.g., "admin", "course_admin", "student")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description
    pub description: String,
    /// Permissions granted by this role
    pub permissions: Vec<String>,
    /// Parent roles (for inheritance)
    #[serde(default)]
    pub inherits: Vec<String>,
}

/// A named, versioned set of roles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub version: String,
    pub roles: Vec<Role>,
}

/// Answers "is this caller authorized" for the editors.
pub trait AccessOracle: Send + Sync {
    /// Whether the caller may view and change course assets.
    fn is_course_admin(&self, caller: &Caller) -> bool;
}

/// Policy engine for evaluating permissions
pub struct PolicyEngine {
    /// Loaded policies
    policies: Vec<Policy>,
    /// Compiled role -> permissions map
    role_permissions: HashMap<String, HashSet<String>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        let mut engine = Self {
            policies: Vec::new(),
            role_permissions: HashMap::new(),
        };
        engine.load_default_policy();
        engine
    }

    /// Load the default built-in policy
    fn load_default_policy(&mut self) {
        let default_policy = Policy {
            id: "default".to_string(),
            name: "Default Courseware Policy".to_string(),
            version: "1.0.0".to_string(),
            roles: vec![
                Role {
                    id: "admin".to_string(),
                    name: "Administrator".to_string(),
                    description: "Full system access".to_string(),
                    permissions: vec!["*".to_string()],
                    inherits: vec![],
                },
                Role {
                    id: "course_admin".to_string(),
                    name: "Course Administrator".to_string(),
                    description: "Can edit course content and settings".to_string(),
                    permissions: vec![COURSE_ADMIN.to_string()],
                    inherits: vec!["student".to_string()],
                },
                Role {
                    id: "student".to_string(),
                    name: "Student".to_string(),
                    description: "Can view published course content".to_string(),
                    permissions: vec![COURSE_READ.to_string()],
                    inherits: vec![],
                },
            ],
        };

        self.add_policy(default_policy);
    }

    /// Add a policy and recompile permissions
    pub fn add_policy(&mut self, policy: Policy) {
        self.policies.push(policy);
        self.compile_permissions();
    }

    /// Compile role -> permission mappings with inheritance
    fn compile_permissions(&mut self) {
        self.role_permissions.clear();

        // First pass: direct permissions
        for policy in &self.policies {
            for role in &policy.roles {
                let perms = self.role_permissions.entry(role.id.clone()).or_default();
                perms.extend(role.permissions.iter().cloned());
            }
        }

        // Second pass: resolve inheritance (single level)
        let roles: Vec<_> = self.policies.iter().flat_map(|p| p.roles.clone()).collect();
        for role in &roles {
            for parent_id in &role.inherits {
                if let Some(parent_perms) = self.role_permissions.get(parent_id).cloned() {
                    if let Some(child_perms) = self.role_permissions.get_mut(&role.id) {
                        child_perms.extend(parent_perms);
                    }
                }
            }
        }
    }

    /// Get all permissions for a set of roles
    pub fn permissions_for_roles(&self, roles: &[String]) -> HashSet<String> {
        let mut perms = HashSet::new();
        for role in roles {
            if let Some(role_perms) = self.role_permissions.get(role) {
                perms.extend(role_perms.iter().cloned());
            }
        }
        perms
    }

    /// Check if a set of roles has a specific permission
    pub fn has_permission(&self, roles: &[String], permission: &str) -> bool {
        let perms = self.permissions_for_roles(roles);
        if perms.contains("*") || perms.contains(permission) {
            return true;
        }
        // Resource wildcard ("course:*" matches "course:admin")
        if let Some((resource, _action)) = permission.split_once(':') {
            if perms.contains(&format!("{}:*", resource)) {
                return true;
            }
        }
        false
    }

    /// Get all defined roles
    pub fn roles(&self) -> Vec<&Role> {
        self.policies.iter().flat_map(|p| &p.roles).collect()
    }

    /// Whether a role id is defined by any loaded policy
    pub fn is_known_role(&self, role: &str) -> bool {
        self.role_permissions.contains_key(role)
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessOracle for PolicyEngine {
    fn is_course_admin(&self, caller: &Caller) -> bool {
        caller.is_authenticated() && self.has_permission(caller.roles(), COURSE_ADMIN)
    }
}
