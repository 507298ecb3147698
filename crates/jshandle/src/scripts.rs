//! JavaScript snippets evaluated on the peer
//!
//! Every function takes the handle's value as its first argument.

/// Copy exactly one own property into a prototype-less holder
pub(crate) const GET_PROPERTY: &str = r#"(object, propertyName) => {
  const result = { __proto__: null };
  result[propertyName] = object[propertyName];
  return result;
}"#;

pub(crate) const RETURN_THIS: &str = "function() { return this; }";

/// Returns an error string, or `false` when the element is in view
pub(crate) const SCROLL_INTO_VIEW_IF_NEEDED: &str = r#"async (element, pageJavascriptEnabled) => {
  if (!element.isConnected) return 'Node is detached from document';
  if (element.nodeType !== Node.ELEMENT_NODE) return 'Node is not of type HTMLElement';
  if (!pageJavascriptEnabled) {
    element.scrollIntoView({ block: 'center', inline: 'center', behavior: 'instant' });
    return false;
  }
  const visibleRatio = await new Promise(resolve => {
    const observer = new IntersectionObserver(entries => {
      resolve(entries[0].intersectionRatio);
      observer.disconnect();
    });
    observer.observe(element);
  });
  if (visibleRatio !== 1.0) {
    element.scrollIntoView({ block: 'center', inline: 'center', behavior: 'instant' });
  }
  return false;
}"#;

pub(crate) const INTERSECTION_RATIO: &str = r#"async element => {
  return await new Promise(resolve => {
    const observer = new IntersectionObserver(entries => {
      resolve(entries[0].intersectionRatio);
      observer.disconnect();
    });
    observer.observe(element);
  });
}"#;

pub(crate) const SELECT_OPTIONS: &str = r#"(element, vals) => {
  const values = new Set(vals);
  if (!(element instanceof HTMLSelectElement)) {
    throw new Error('Element is not a <select> element.');
  }
  const selectedValues = new Set();
  if (!element.multiple) {
    for (const option of element.options) {
      option.selected = false;
    }
    for (const option of element.options) {
      if (values.has(option.value)) {
        option.selected = true;
        selectedValues.add(option.value);
        break;
      }
    }
  } else {
    for (const option of element.options) {
      option.selected = values.has(option.value);
      if (option.selected) {
        selectedValues.add(option.value);
      }
    }
  }
  element.dispatchEvent(new Event('input', { bubbles: true }));
  element.dispatchEvent(new Event('change', { bubbles: true }));
  return [...selectedValues.values()];
}"#;

pub(crate) const IS_MULTIPLE: &str = "element => !!element.multiple";

pub(crate) const CLEAR_FILES: &str = r#"element => {
  element.files = new DataTransfer().files;
  element.dispatchEvent(new Event('input', { bubbles: true }));
  element.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

pub(crate) const FOCUS: &str = "element => element.focus()";

pub(crate) const QUERY_SELECTOR: &str = "(element, selector) => element.querySelector(selector)";

pub(crate) const QUERY_SELECTOR_ALL: &str =
    "(element, selector) => Array.from(element.querySelectorAll(selector))";

pub(crate) const XPATH_ALL: &str = r#"(element, expression) => {
  const document = element.ownerDocument || element;
  const iterator = document.evaluate(
    expression,
    element,
    null,
    XPathResult.ORDERED_NODE_ITERATOR_TYPE
  );
  const array = [];
  let item;
  while ((item = iterator.iterateNext())) {
    array.push(item);
  }
  return array;
}"#;
