pub mod action;
pub mod collaboration;
pub mod comment;
pub mod heatmap_commit;
pub mod issue;
pub mod issue_watch;
pub mod notification;
pub mod repo_unit;
pub mod repository;
pub mod team;
pub mod team_repo;
pub mod team_unit;
pub mod team_user;
pub mod user;
pub mod user_feed;
pub mod watch;

pub use action::{Entity as Action, Model as ActionModel, OpType, UnitScope};
pub use collaboration::Entity as Collaboration;
pub use comment::{Entity as Comment, Model as CommentModel};
pub use heatmap_commit::Entity as HeatmapCommit;
pub use issue::{Entity as Issue, Model as IssueModel};
pub use issue_watch::Entity as IssueWatch;
pub use notification::{
    Entity as Notification, Model as NotificationModel, NotificationSource, NotificationStatus,
};
pub use repo_unit::{Entity as RepoUnit, UnitType};
pub use repository::{Entity as Repository, Model as RepositoryModel};
pub use team::{Entity as Team, Model as TeamModel};
pub use team_repo::Entity as TeamRepo;
pub use team_unit::Entity as TeamUnit;
pub use team_user::Entity as TeamUser;
pub use user::{Entity as User, Model as UserModel, Visibility};
pub use user_feed::Entity as UserFeed;
pub use watch::{Entity as Watch, WatchMode};
