use lopdf::{Dictionary, Object, ObjectId, dictionary};

use super::content::FONT_RESOURCE;

/// Build a page's resources dictionary with the label font and XObjects
///
/// Every page shares the one font object; images are registered per page
/// under the names the content stream uses.
pub fn page_resources(font_id: ObjectId, xobject_dict: &Dictionary) -> Dictionary {
    let mut resources = dictionary! {
        "Font" => dictionary! {
            FONT_RESOURCE => font_id,
        },
        "ProcSet" => vec![Object::from("PDF"), Object::from("Text"), Object::from("ImageB")],
    };

    if !xobject_dict.is_empty() {
        resources.set("XObject", Object::Dictionary(xobject_dict.clone()));
    }
    resources
}
